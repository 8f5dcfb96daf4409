// Traitement des images uploadées : redimensionnement + JPEG qualité 90

use actix_web::mime::{self, Mime};
use actix_web::web;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::AppError;

const JPEG_QUALITY: u8 = 90;

pub const USER_PHOTO_SIZE: (u32, u32) = (500, 500);
pub const TOUR_IMAGE_SIZE: (u32, u32) = (2000, 1333);

pub fn ensure_image(content_type: Option<&Mime>) -> Result<(), AppError> {
    match content_type {
        Some(content_type) if content_type.type_() == mime::IMAGE => Ok(()),
        _ => Err(AppError::bad_request("Not an image! Please upload only images.")),
    }
}

/// Décode, recadre aux dimensions exactes et ré-encode en JPEG
pub fn encode_jpeg(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|_| AppError::bad_request("Not an image! Please upload only images."))?;
    let resized = image::DynamicImage::ImageRgb8(
        decoded.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8(),
    );

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    resized
        .write_with_encoder(encoder)
        .map_err(|e| AppError::Image(e.to_string()))?;

    Ok(out.into_inner())
}

/// Exécuté sur le pool bloquant d'actix : le décodage est coûteux en CPU
pub async fn resize_and_save(
    bytes: Vec<u8>,
    (width, height): (u32, u32),
    path: PathBuf,
) -> Result<(), AppError> {
    web::block(move || -> Result<(), AppError> {
        let jpeg = encode_jpeg(&bytes, width, height)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| AppError::Image(format!("Cannot create {}: {}", dir.display(), e)))?;
        }
        std::fs::write(&path, jpeg)
            .map_err(|e| AppError::Image(format!("Cannot write {}: {}", path.display(), e)))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Blocking pool error: {}", e)))?
}

pub fn user_photo_name(user_id: i32, now: DateTime<Utc>) -> String {
    format!("user-{}-{}.jpeg", user_id, now.timestamp_millis())
}

pub fn tour_cover_name(tour_id: i32, now: DateTime<Utc>) -> String {
    format!("tour-{}-{}-cover.jpeg", tour_id, now.timestamp_millis())
}

/// `index` commence à 1
pub fn tour_image_name(tour_id: i32, now: DateTime<Utc>, index: usize) -> String {
    format!("tour-{}-{}-{}.jpeg", tour_id, now.timestamp_millis(), index)
}

pub fn users_dir(public_dir: &str) -> PathBuf {
    Path::new(public_dir).join("img").join("users")
}

pub fn tours_dir(public_dir: &str) -> PathBuf {
    Path::new(public_dir).join("img").join("tours")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_encode_jpeg_resizes_to_fill() {
        let jpeg = encode_jpeg(&png(40, 20), 10, 10).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (10, 10));
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = encode_jpeg(b"definitely not an image", 10, 10).unwrap_err();
        assert_eq!(err.translate().status.as_u16(), 400);
    }

    #[test]
    fn test_ensure_image() {
        assert!(ensure_image(Some(&mime::IMAGE_JPEG)).is_ok());
        assert!(ensure_image(Some(&mime::TEXT_PLAIN)).is_err());
        assert!(ensure_image(None).is_err());
    }

    #[test]
    fn test_file_names() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        assert_eq!(user_photo_name(5, now), "user-5-1700000000000.jpeg");
        assert_eq!(tour_cover_name(3, now), "tour-3-1700000000000-cover.jpeg");
        assert_eq!(tour_image_name(3, now, 2), "tour-3-1700000000000-2.jpeg");
    }

    #[actix_web::test]
    async fn test_resize_and_save_writes_file() {
        let path = std::env::temp_dir().join(format!("natours-test-{}.jpeg", std::process::id()));
        resize_and_save(png(30, 30), (8, 8), path.clone()).await.unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        std::fs::remove_file(path).unwrap();
    }
}

// Corps de requêtes (avec règles `validator`) et réponses structurées de l'API

use actix_multipart::form::{MultipartForm, bytes::Bytes, text::Text};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use super::tour::{Difficulty, GeoPoint};
use super::users::Role;
use super::{booking, review, tour, users};

// ----------------------------------------------------------------------------
// Users / auth
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

/// Champs optionnels : l'absence est une erreur métier (400), pas une erreur de parsing
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

/// Les champs password* sont captés pour pouvoir refuser la requête
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }
}

#[derive(MultipartForm)]
pub struct UpdateMeForm {
    pub name: Option<Text<String>>,
    pub email: Option<Text<String>>,
    pub password: Option<Text<String>>,
    #[multipart(rename = "passwordConfirm")]
    pub password_confirm: Option<Text<String>>,
    #[multipart(limit = "10MB")]
    pub photo: Option<Bytes>,
}

/// Mise à jour admin : jamais le mot de passe
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

/// Formulaire HTML du compte (POST /submit-user-data)
#[derive(Debug, Deserialize, Validate)]
pub struct UserDataForm {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

// ----------------------------------------------------------------------------
// Tours
// ----------------------------------------------------------------------------

fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    if Difficulty::parse(value).is_some() {
        return Ok(());
    }
    let mut error = ValidationError::new("difficulty");
    error.message = Some("Difficulty is either: easy, medium, difficult".into());
    Err(error)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTourRequest {
    #[validate(
        required(message = "A tour must have a name"),
        length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "A tour must have a duration"),
        range(min = 1, message = "A tour duration must be at least one day")
    )]
    pub duration: Option<i32>,
    #[validate(
        required(message = "A tour must have a group size"),
        range(min = 1, message = "A tour group must hold at least one person")
    )]
    pub max_group_size: Option<i32>,
    #[validate(
        required(message = "A tour must have a difficulty"),
        custom(function = "validate_difficulty")
    )]
    pub difficulty: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(required(message = "A tour must have a price"))]
    pub price: Option<Decimal>,
    pub price_discount: Option<Decimal>,
    #[validate(
        required(message = "A tour must have a summary"),
        length(min = 1, message = "A tour must have a summary")
    )]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(required(message = "A tour must have a cover image"))]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
    #[serde(default)]
    pub guides: Vec<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTourRequest {
    #[validate(
        length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters")
    )]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour duration must be at least one day"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour group must hold at least one person"))]
    pub max_group_size: Option<i32>,
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: Option<String>,
    pub price: Option<Decimal>,
    pub price_discount: Option<Decimal>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<GeoPoint>>,
    pub guides: Option<Vec<i32>>,
}

#[derive(MultipartForm)]
pub struct TourImagesForm {
    #[multipart(rename = "imageCover", limit = "10MB")]
    pub image_cover: Option<Bytes>,
    #[multipart(limit = "10MB")]
    pub images: Vec<Bytes>,
}

// ----------------------------------------------------------------------------
// Reviews / bookings
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(
        required(message = "Review can not be empty!"),
        length(min = 1, message = "Review can not be empty!")
    )]
    pub review: Option<String>,
    #[validate(
        required(message = "A review must have a rating"),
        range(min = 1, max = 5, message = "Rating must be between 1 and 5")
    )]
    pub rating: Option<i32>,
    pub tour: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tour: i32,
    pub user: i32,
    pub price: Decimal,
    pub paid: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingRequest {
    pub tour: Option<i32>,
    pub user: Option<i32>,
    pub price: Option<Decimal>,
    pub paid: Option<bool>,
}

// ----------------------------------------------------------------------------
// Réponses "populées"
// ----------------------------------------------------------------------------

/// Auteur d'une review : uniquement {id, name, photo}
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub photo: String,
}

impl From<&users::Model> for UserSummary {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            photo: user.photo.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: i32,
    pub review: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub tour: i32,
    pub user: Option<UserSummary>,
}

impl ReviewResponse {
    pub fn new(review: review::Model, author: Option<&users::Model>) -> Self {
        Self {
            id: review.id,
            review: review.review,
            rating: review.rating,
            created_at: review.created_at,
            tour: review.tour_id,
            user: author.map(UserSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourResponse {
    #[serde(flatten)]
    pub tour: tour::Model,
    pub duration_weeks: f64,
    pub guides: Vec<users::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewResponse>>,
}

impl TourResponse {
    pub fn new(tour: tour::Model, guides: Vec<users::Model>) -> Self {
        Self {
            duration_weeks: tour.duration_weeks(),
            tour,
            guides,
            reviews: None,
        }
    }

    pub fn with_reviews(mut self, reviews: Vec<ReviewResponse>) -> Self {
        self.reviews = Some(reviews);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TourSummary {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: i32,
    pub tour: Option<TourSummary>,
    pub user: Option<users::Model>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub paid: bool,
}

impl BookingResponse {
    pub fn new(
        booking: booking::Model,
        tour: Option<&tour::Model>,
        user: Option<users::Model>,
    ) -> Self {
        Self {
            id: booking.id,
            tour: tour.map(|t| TourSummary {
                id: t.id,
                name: t.name.clone(),
            }),
            user,
            price: booking.price,
            created_at: booking.created_at,
            paid: booking.paid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_tour, sample_user};
    use serde_json::json;

    #[test]
    fn test_signup_passwords_must_match() {
        let request: SignupRequest = serde_json::from_value(json!({
            "name": "Laura Wilson",
            "email": "laura@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass4321"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password_confirm"));
    }

    #[test]
    fn test_signup_rejects_invalid_email() {
        let request: SignupRequest = serde_json::from_value(json!({
            "name": "Laura Wilson",
            "email": "not-an-email",
            "password": "pass1234",
            "passwordConfirm": "pass1234"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_create_tour_required_fields() {
        let request: CreateTourRequest = serde_json::from_value(json!({
            "name": "Short",
            "difficulty": "extreme"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("difficulty"));
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("duration"));
    }

    #[test]
    fn test_create_tour_valid() {
        let request: CreateTourRequest = serde_json::from_value(json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "guides": [2, 3]
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        assert_eq!(request.guides, vec![2, 3]);
        assert!(!request.secret_tour);
    }

    #[test]
    fn test_update_me_detects_password_fields() {
        let request: UpdateMeRequest =
            serde_json::from_value(json!({ "name": "Laura", "password": "newpass123" })).unwrap();
        assert!(request.touches_password());

        let request: UpdateMeRequest = serde_json::from_value(json!({ "name": "Laura" })).unwrap();
        assert!(!request.touches_password());
    }

    #[test]
    fn test_review_rating_range() {
        let request: CreateReviewRequest =
            serde_json::from_value(json!({ "review": "Amazing!", "rating": 6 })).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_tour_response_flattens_model() {
        let response = TourResponse::new(sample_tour(1, "The Forest Hiker"), vec![sample_user()]);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["name"], "The Forest Hiker");
        assert_eq!(json["durationWeeks"], 5.0 / 7.0);
        assert_eq!(json["guides"][0]["name"], "Laura Wilson");
        assert!(json["guides"][0].get("password").is_none());
        assert!(json.get("reviews").is_none());
    }

    #[test]
    fn test_review_author_summary() {
        let user = sample_user();
        let summary = UserSummary::from(&user);
        let json = serde_json::to_value(summary).unwrap();

        assert_eq!(json, json!({ "id": 1, "name": "Laura Wilson", "photo": "default.jpg" }));
    }
}

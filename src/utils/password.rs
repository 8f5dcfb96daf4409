use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2_sha256";
const ITERATIONS: u32 = 260000;
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;
const RESET_TOKEN_LENGTH: usize = 32;

/// Hash un mot de passe avec PBKDF2-HMAC-SHA256
/// Format: pbkdf2_sha256$iterations$salt$hash (salt et hash en base64 URL-safe)
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill(&mut salt);

    let key = derive(password, &salt, ITERATIONS, KEY_LENGTH)?;

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        ITERATIONS,
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(key)
    ))
}

/// Vérifie un mot de passe contre un hash stocké
/// Un hash illisible est une erreur interne, pas un mauvais mot de passe
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let invalid = || AppError::Internal("Invalid password hash format".to_string());

    let parts: Vec<&str> = stored_hash.split('$').collect();
    let [scheme, iterations, salt, hash] = parts.as_slice() else {
        return Err(invalid());
    };
    if *scheme != SCHEME {
        return Err(invalid());
    }

    let iterations: u32 = iterations.parse().map_err(|_| invalid())?;
    let salt = URL_SAFE_NO_PAD.decode(salt).map_err(|_| invalid())?;
    let expected = URL_SAFE_NO_PAD.decode(hash).map_err(|_| invalid())?;

    let computed = derive(password, &salt, iterations, expected.len())?;

    Ok(constant_time_eq(&computed, &expected))
}

/// Token de reset : (token en clair envoyé par email, digest SHA-256 stocké en base)
pub fn new_reset_token() -> (String, String) {
    let mut bytes = [0u8; RESET_TOKEN_LENGTH];
    rand::thread_rng().fill(&mut bytes);

    let plain = hex::encode(bytes);
    let digest = hash_reset_token(&plain);
    (plain, digest)
}

pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

fn derive(password: &str, salt: &[u8], iterations: u32, len: usize) -> Result<Vec<u8>, AppError> {
    let mut key = vec![0u8; len];
    pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut key)
        .map_err(|e| AppError::Internal(format!("PBKDF2 failed: {}", e)))?;
    Ok(key)
}

// Comparaison en temps constant pour éviter les timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

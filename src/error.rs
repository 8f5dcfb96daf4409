// Traduction centralisée des erreurs vers des réponses HTTP
//
// Les erreurs "opérationnelles" (entrée invalide, auth, not found) sont
// renvoyées telles quelles. Les autres sont loggées puis masquées en production.

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};
use jsonwebtoken::errors::ErrorKind;
use sea_orm::{DbErr, SqlErr};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};
use validator::ValidationErrors;

use crate::config::{self, Environment};
use crate::templates;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    #[error("Invalid {field}: {value}.")]
    Cast { field: String, value: String },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Email error: {0}")]
    Mail(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Résultat de la traduction : statut, message public, et si l'erreur est attendue
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub status: StatusCode,
    pub message: String,
    pub operational: bool,
}

impl Translated {
    fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            operational: true,
        }
    }

    fn unexpected(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            operational: false,
        }
    }
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn cast(field: impl Into<String>, value: impl Into<String>) -> Self {
        AppError::Cast {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn translate(&self) -> Translated {
        match self {
            AppError::Operational { status, message } => Translated::operational(*status, message),
            AppError::Cast { .. } => Translated::operational(StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Database(err) => translate_db_error(err),
            AppError::Validation(errors) => Translated::operational(
                StatusCode::BAD_REQUEST,
                format!("Invalid input data. {}", validation_messages(errors).join(". ")),
            ),
            AppError::Token(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Translated::operational(
                    StatusCode::UNAUTHORIZED,
                    "Your token has expired! Please log in again.",
                ),
                _ => Translated::operational(
                    StatusCode::UNAUTHORIZED,
                    "Invalid token. Please log in again!",
                ),
            },
            AppError::Template(_)
            | AppError::Mail(_)
            | AppError::Payment(_)
            | AppError::Image(_)
            | AppError::Internal(_) => Translated::unexpected(self.to_string()),
        }
    }

    /// Corps JSON de la réponse selon le mode (development expose le détail)
    pub fn body(&self, environment: Environment) -> Value {
        let translated = self.translate();
        let status = status_label(translated.status);

        match environment {
            Environment::Development => json!({
                "status": status,
                "message": translated.message,
                "error": self.to_string(),
                "stack": format!("{:?}", self),
            }),
            Environment::Production if translated.operational => json!({
                "status": status,
                "message": translated.message,
            }),
            Environment::Production => json!({
                "status": "error",
                "message": "Something went very wrong!",
            }),
        }
    }

    fn log(&self, translated: &Translated) {
        if translated.operational {
            debug!(status = %translated.status, message = %translated.message, "Operational error");
        } else {
            error!(error = ?self, "Unexpected error");
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.translate().status
    }

    fn error_response(&self) -> HttpResponse {
        let translated = self.translate();
        self.log(&translated);

        HttpResponse::build(translated.status).json(self.body(config::environment()))
    }
}

/// Erreur des pages rendues côté serveur : même traduction, rendu HTML
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PageError(#[from] pub AppError);

impl PageError {
    pub fn message(&self, environment: Environment) -> String {
        let translated = self.0.translate();
        if translated.operational || !environment.is_production() {
            translated.message
        } else {
            "Please try again later.".to_string()
        }
    }
}

impl ResponseError for PageError {
    fn status_code(&self) -> StatusCode {
        self.0.translate().status
    }

    fn error_response(&self) -> HttpResponse {
        let translated = self.0.translate();
        self.0.log(&translated);

        let message = self.message(config::environment());
        let mut context = tera::Context::new();
        context.insert("title", "Something went wrong!");
        context.insert("msg", &message);

        match templates::render("error.html", &context) {
            Ok(html) => HttpResponse::build(translated.status)
                .content_type(ContentType::html())
                .body(html),
            Err(e) => {
                error!(error = ?e, "Failed to render error page");
                HttpResponse::build(translated.status)
                    .content_type(ContentType::plaintext())
                    .body(message)
            }
        }
    }
}

fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() { "fail" } else { "error" }
}

fn translate_db_error(err: &DbErr) -> Translated {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => Translated::operational(
            StatusCode::BAD_REQUEST,
            format!(
                "Duplicate field value: {}. Please use another value!",
                quoted_value(&detail).unwrap_or(detail.as_str())
            ),
        ),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => Translated::operational(
            StatusCode::BAD_REQUEST,
            "Invalid reference: the related document does not exist.",
        ),
        _ => match err {
            DbErr::RecordNotFound(_) => {
                Translated::operational(StatusCode::NOT_FOUND, "No document found with that ID")
            }
            _ => Translated::unexpected(err.to_string()),
        },
    }
}

/// Premier passage entre guillemets dans un message du driver, guillemets compris
fn quoted_value(detail: &str) -> Option<&str> {
    let start = detail.find(['"', '\''])?;
    let quote = detail[start..].chars().next()?;
    let end = detail[start + 1..].find(quote)? + start + 1;
    Some(&detail[start..=end])
}

fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect()
}

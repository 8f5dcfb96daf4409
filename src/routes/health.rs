use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use tracing::warn;

use crate::models::health::HealthResponse;
use crate::state::AppState;

/// GET /api/health - état du process et de la base
#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(e) => {
            warn!("Database ping failed: {}", e);
            "down"
        }
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        environment: state.config.environment.as_str(),
        database,
        time: Utc::now(),
    };

    HttpResponse::Ok().json(response)
}

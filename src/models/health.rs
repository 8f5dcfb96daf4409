use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: &'static str,
    pub database: &'static str,
    pub time: DateTime<Utc>,
}

// Enveloppes JSON communes à toutes les routes de l'API

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};

use super::api_features::Projection;
use crate::error::AppError;

/// {"status":"success","data":{"data":...}}
pub fn document<T: Serialize>(status: StatusCode, data: T) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "status": "success",
        "data": { "data": data },
    }))
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    document(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    document(StatusCode::CREATED, data)
}

/// Liste avec "results", après projection des champs demandés
pub fn list<T: Serialize>(items: Vec<T>, projection: &Projection) -> Result<HttpResponse, AppError> {
    let documents = items
        .into_iter()
        .map(|item| serde_json::to_value(item).map(|doc| projection.apply(doc)))
        .collect::<Result<Vec<Value>, _>>()
        .map_err(|e| AppError::Internal(format!("Failed to serialize documents: {}", e)))?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": documents.len(),
        "data": { "data": documents },
    })))
}

pub fn no_content() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

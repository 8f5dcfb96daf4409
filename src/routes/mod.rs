pub mod auth;
pub mod bookings;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;
pub mod views;
pub mod webhook;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError, UrlencodedError};
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};

use crate::error::{AppError, PageError};
use crate::utils::api_features::QueryParams;

/// Taille max des corps JSON / urlencoded
pub const BODY_LIMIT: usize = 10 * 1024;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(form_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(web::scope("/api").service(health::health_check).service(
            web::scope("/v1")
                .configure(users::users_routes)
                .configure(tours::tours_routes)
                .configure(reviews::reviews_routes)
                .configure(bookings::bookings_routes),
        ))
        .service(webhook::webhook_checkout)
        .configure(views::views_routes);
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(BODY_LIMIT)
        .error_handler(|err: JsonPayloadError, _req| {
            AppError::bad_request(format!("Invalid request body: {}", err)).into()
        })
}

fn form_config() -> web::FormConfig {
    web::FormConfig::default()
        .limit(BODY_LIMIT)
        .error_handler(|err: UrlencodedError, _req| {
            PageError(AppError::bad_request(format!("Invalid form data: {}", err))).into()
        })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: PathError, _req| {
        AppError::bad_request(format!("Invalid path parameter: {}", err)).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req| {
        AppError::bad_request(format!("Invalid query string: {}", err)).into()
    })
}

/// Query string brute -> paramètres du constructeur de requêtes
pub fn query_params(query: web::Query<Vec<(String, String)>>) -> QueryParams {
    QueryParams::from_pairs(query.into_inner())
}

/// "http://host:port" tel que vu par le client
pub fn base_url(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}

/// Route inconnue : JSON sous /api, page d'erreur ailleurs
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    let err = AppError::not_found(format!("Can't find {} on this server!", req.uri()));

    if req.path().starts_with("/api") {
        err.error_response()
    } else {
        PageError(err).error_response()
    }
}

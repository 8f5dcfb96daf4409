use actix_web::{HttpResponse, delete, get, patch, post, web};
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{CreateReviewRequest, UpdateReviewRequest};
use crate::models::users::Role;
use crate::routes::query_params;
use crate::services::review_service::ReviewService;
use crate::state::AppState;
use crate::utils::response;

/// GET /reviews (PROTÉGÉE)
#[get("")]
pub async fn get_all_reviews(
    _auth_user: AuthUser,
    query: web::Query<Vec<(String, String)>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (reviews, projection) = ReviewService::list(&state.db, None, query_params(query)).await?;
    response::list(reviews, &projection)
}

/// POST /reviews (user) - tour dans le corps, auteur = utilisateur connecté
#[post("")]
pub async fn create_review(
    auth_user: AuthUser,
    body: web::Json<CreateReviewRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::User])?;
    body.validate()?;

    let review = ReviewService::create(&state.db, &auth_user.user, None, body.into_inner()).await?;
    Ok(response::created(review))
}

/// GET /reviews/{id} (PROTÉGÉE)
#[get("/{id}")]
pub async fn get_review(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let review = ReviewService::find(&state.db, path.into_inner()).await?;
    Ok(response::ok(review))
}

/// PATCH /reviews/{id} (user, admin)
#[patch("/{id}")]
pub async fn update_review(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateReviewRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::User, Role::Admin])?;
    body.validate()?;

    let review =
        ReviewService::update(&state.db, path.into_inner(), &auth_user.user, body.into_inner()).await?;
    Ok(response::ok(review))
}

/// DELETE /reviews/{id} (user, admin)
#[delete("/{id}")]
pub async fn delete_review(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::User, Role::Admin])?;

    ReviewService::delete(&state.db, path.into_inner(), &auth_user.user).await?;
    Ok(response::no_content())
}

pub fn reviews_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reviews")
            .service(get_all_reviews)
            .service(create_review)
            .service(get_review)
            .service(update_review)
            .service(delete_review),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_user, sample_user_with, test_state_with};
    use crate::routes::configure_routes;
    use crate::utils::jwt;
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test};
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn bearer(user_id: i32) -> (header::HeaderName, String) {
        let token = jwt::generate_token(
            user_id,
            "my-ultra-secure-and-ultra-long-secret",
            Duration::hours(1),
        )
        .unwrap();
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn test_reviews_require_login() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(crate::fixtures::empty_db())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/reviews").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_guides_cannot_post_reviews() {
        let guide = sample_user_with(4, "Leo Gillespie", Role::Guide);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![guide]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/reviews")
            .insert_header(bearer(4))
            .set_json(json!({ "review": "Great!", "rating": 5, "tour": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_rating_out_of_range() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/reviews")
            .insert_header(bearer(1))
            .set_json(json!({ "review": "Meh", "rating": 9, "tour": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

use actix_multipart::form::MultipartForm;
use actix_web::http::StatusCode;
use actix_web::{Either, HttpResponse, delete, get, patch, post, web};
use chrono::Utc;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{UpdateMeForm, UpdateMeRequest, UpdateUserRequest};
use crate::models::users::Role;
use crate::routes::{auth, query_params};
use crate::services::user_service::UserService;
use crate::state::AppState;
use crate::utils::{images, response};

/// GET /users/me (PROTÉGÉE)
#[get("/me")]
pub async fn get_me(auth_user: AuthUser) -> HttpResponse {
    response::ok(auth_user.user)
}

/// PATCH /users/updateMe (PROTÉGÉE) - JSON ou multipart avec "photo"
#[patch("/updateMe")]
pub async fn update_me(
    auth_user: AuthUser,
    body: Either<web::Json<UpdateMeRequest>, MultipartForm<UpdateMeForm>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    // 1. Normaliser les deux formats de corps
    let (request, photo) = match body {
        Either::Left(json) => (json.into_inner(), None),
        Either::Right(form) => {
            let form = form.into_inner();
            let request = UpdateMeRequest {
                name: form.name.map(|t| t.into_inner()),
                email: form.email.map(|t| t.into_inner()),
                password: form.password.map(|t| t.into_inner().into()),
                password_confirm: form.password_confirm.map(|t| t.into_inner().into()),
            };
            (request, form.photo.filter(|p| !p.data.is_empty()))
        }
    };

    // 2. Refuser toute tentative de changement de mot de passe ici
    if request.touches_password() {
        return Err(AppError::bad_request(
            "This route is not for password updates. Please use /updateMyPassword.",
        ));
    }
    request.validate()?;

    // 3. Photo : 500x500 JPEG dans public/img/users
    let photo_name = match photo {
        Some(photo) => {
            images::ensure_image(photo.content_type.as_ref())?;
            let name = images::user_photo_name(auth_user.id(), Utc::now());
            let path = images::users_dir(&state.config.public_dir).join(&name);
            images::resize_and_save(photo.data.to_vec(), images::USER_PHOTO_SIZE, path).await?;
            Some(name)
        }
        None => None,
    };

    // 4. Seuls name, email et photo sont modifiés
    let user = UserService::update_profile(
        &state.db,
        auth_user.user,
        request.name,
        request.email,
        photo_name,
    )
    .await?;

    Ok(response::ok(user))
}

/// DELETE /users/deleteMe (PROTÉGÉE) - soft delete
#[delete("/deleteMe")]
pub async fn delete_me(auth_user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    UserService::deactivate(&state.db, auth_user.id()).await?;
    Ok(response::no_content())
}

/// GET /users (ADMIN)
#[get("")]
pub async fn get_all_users(
    auth_user: AuthUser,
    query: web::Query<Vec<(String, String)>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::Admin])?;

    let (users, projection) = UserService::list(&state.db, query_params(query)).await?;
    response::list(users, &projection)
}

/// POST /users (ADMIN) - la création passe par /signup
#[post("")]
pub async fn create_user(auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::Admin])?;

    Err(AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "This route is not defined! Please use /signup instead",
    ))
}

/// GET /users/{id} (ADMIN)
#[get("/{id}")]
pub async fn get_user(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::Admin])?;

    let user = UserService::find_by_id(&state.db, path.into_inner()).await?;
    Ok(response::ok(user))
}

/// PATCH /users/{id} (ADMIN) - jamais le mot de passe
#[patch("/{id}")]
pub async fn update_user(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::Admin])?;
    body.validate()?;

    let user = UserService::update(&state.db, path.into_inner(), body.into_inner()).await?;
    Ok(response::ok(user))
}

/// DELETE /users/{id} (ADMIN)
#[delete("/{id}")]
pub async fn delete_user(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::Admin])?;

    UserService::delete(&state.db, path.into_inner()).await?;
    Ok(response::no_content())
}

pub fn users_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            // Authentification
            .service(auth::signup)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::forgot_password)
            .service(auth::reset_password)
            .service(auth::update_password)
            // Compte courant
            .service(get_me)
            .service(update_me)
            .service(delete_me)
            // Administration
            .service(get_all_users)
            .service(create_user)
            .service(get_user)
            .service(update_user)
            .service(delete_user),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_user, sample_user_with, test_state_with};
    use crate::routes::configure_routes;
    use crate::utils::jwt;
    use actix_web::http::header;
    use actix_web::{App, test};
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::{Value, json};

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
    async fn test_get_me() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/users/me")
            .insert_header(bearer(1))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["data"]["name"], "Laura Wilson");
        assert!(body["data"]["data"].get("password").is_none());
    }

    #[actix_web::test]
    async fn test_update_me_rejects_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::patch()
            .uri("/api/v1/users/updateMe")
            .insert_header(bearer(1))
            .set_json(json!({ "name": "Laura", "password": "newpass123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "This route is not for password updates. Please use /updateMyPassword."
        );
    }

    #[actix_web::test]
    async fn test_update_me_changes_name() {
        let mut renamed = sample_user();
        renamed.name = "Laura Smith".to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .append_query_results([vec![renamed]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::patch()
            .uri("/api/v1/users/updateMe")
            .insert_header(bearer(1))
            .set_json(json!({ "name": "Laura Smith", "role": "admin" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["data"]["name"], "Laura Smith");
        assert_eq!(body["data"]["data"]["role"], "user");
    }

    #[actix_web::test]
    async fn test_delete_me_is_soft() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::delete()
            .uri("/api/v1/users/deleteMe")
            .insert_header(bearer(1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_listing_users_requires_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/users")
            .insert_header(bearer(1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_admin_lists_users_with_projection() {
        let admin = sample_user_with(9, "Jonas Schmedtmann", Role::Admin);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![admin.clone()]])
            .append_query_results([vec![sample_user(), admin]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/users?fields=name&role=user")
            .insert_header(bearer(9))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["results"], 2);
        assert_eq!(body["data"]["data"][0], json!({ "id": 1, "name": "Laura Wilson" }));
    }

    #[actix_web::test]
    async fn test_create_user_points_to_signup() {
        let admin = sample_user_with(9, "Jonas Schmedtmann", Role::Admin);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![admin]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/users")
            .insert_header(bearer(9))
            .set_json(json!({ "name": "New" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "This route is not defined! Please use /signup instead");
    }
}

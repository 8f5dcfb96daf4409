use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, get, patch, post, web};
use serde_json::json;
use tracing::{error, info, warn};
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::middleware::auth::JWT_COOKIE;
use crate::models::dto::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest, UpdatePasswordRequest,
};
use crate::models::users;
use crate::routes::base_url;
use crate::services::email::Email;
use crate::services::user_service::UserService;
use crate::state::AppState;
use crate::utils::jwt;

/// Émet le JWT : cookie http-only + copie dans le corps
pub fn send_token(state: &AppState, user: users::Model, status: StatusCode) -> Result<HttpResponse, AppError> {
    let config = &state.config;
    let token = jwt::generate_token(user.id, &config.jwt_secret, config.jwt_expires_in)?;

    let cookie = Cookie::build(JWT_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .expires(OffsetDateTime::now_utc() + CookieDuration::days(config.jwt_cookie_expires_in_days))
        .finish();

    Ok(HttpResponse::build(status).cookie(cookie).json(json!({
        "status": "success",
        "token": token,
        "data": { "user": user },
    })))
}

/// POST /users/signup - Créer un compte (PUBLIC)
#[post("/signup")]
pub async fn signup(
    req: HttpRequest,
    body: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    // 1. Valider le corps
    body.validate()?;

    // 2. Créer l'utilisateur (hook pre-save : hash du mot de passe)
    let user = UserService::create(&state.db, &body).await?;

    // 3. Email de bienvenue, un échec n'annule pas l'inscription
    let url = format!("{}/me", base_url(&req));
    if let Err(e) = Email::new(&user, url).send_welcome(state.mailer.as_ref()).await {
        warn!(user_id = user.id, "Welcome email not sent: {}", e);
    }

    // 4. Connecter directement
    send_token(&state, user, StatusCode::CREATED)
}

/// POST /users/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(body: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    // 1. Email et mot de passe présents
    let LoginRequest {
        email: Some(email),
        password: Some(password),
    } = body.into_inner()
    else {
        return Err(AppError::bad_request("Please provide email and password!"));
    };

    // 2. Vérifier les identifiants
    let user = UserService::login(&state.db, &email, &password).await?;

    // 3. Émettre le token
    send_token(&state, user, StatusCode::OK)
}

/// GET /users/logout - Remplace le cookie par une valeur invalide qui expire vite
#[get("/logout")]
pub async fn logout() -> HttpResponse {
    let cookie = Cookie::build(JWT_COOKIE, "loggedout")
        .path("/")
        .http_only(true)
        .expires(OffsetDateTime::now_utc() + CookieDuration::seconds(10))
        .finish();

    HttpResponse::Ok().cookie(cookie).json(json!({ "status": "success" }))
}

/// POST /users/forgotPassword - Envoie un lien de reset valable 10 minutes
#[post("/forgotPassword")]
pub async fn forgot_password(
    req: HttpRequest,
    body: web::Json<ForgotPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    // 1. Trouver l'utilisateur
    let user = UserService::find_by_email(&state.db, &body.email)
        .await?
        .ok_or_else(|| AppError::not_found("There is no user with email address."))?;

    // 2. Générer le token (seul le digest est stocké)
    let token = UserService::create_reset_token(&state.db, user.clone()).await?;

    // 3. Envoyer le lien ; en cas d'échec le token est invalidé
    let url = format!("{}/api/v1/users/resetPassword/{}", base_url(&req), token);
    if let Err(e) = Email::new(&user, url).send_password_reset(state.mailer.as_ref()).await {
        error!(user_id = user.id, "Password reset email failed: {}", e);
        UserService::clear_reset_token(&state.db, user.id).await?;
        return Err(AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error sending the email. Try again later!",
        ));
    }

    info!(user_id = user.id, "Password reset token sent");
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Token sent to email!",
    })))
}

/// PATCH /users/resetPassword/{token}
#[patch("/resetPassword/{token}")]
pub async fn reset_password(
    path: web::Path<String>,
    body: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let user = UserService::reset_password(&state.db, &path.into_inner(), &body.password).await?;
    send_token(&state, user, StatusCode::OK)
}

/// PATCH /users/updateMyPassword (PROTÉGÉE)
#[patch("/updateMyPassword")]
pub async fn update_password(
    auth_user: AuthUser,
    body: web::Json<UpdatePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let user = UserService::change_password(
        &state.db,
        auth_user.user,
        &body.password_current,
        &body.password,
    )
    .await?;

    // Nouveau token : l'ancien est invalidé par password_changed_at
    send_token(&state, user, StatusCode::OK)
}

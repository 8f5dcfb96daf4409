use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures::future::LocalBoxFuture;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::error::{AppError, PageError};
use crate::models::users::{self, Role};
use crate::state::AppState;
use crate::utils::jwt;

pub const JWT_COOKIE: &str = "jwt";

/// Utilisateur authentifié (équivalent du middleware "protect")
/// Utilisé comme extracteur dans les routes protégées de l'API
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: users::Model,
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Autorisation par liste de rôles
    pub fn restrict_to(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.user.role.is_any_of(roles) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You do not have permission to perform this action",
            ))
        }
    }
}

/// Token depuis "Authorization: Bearer <token>", sinon depuis le cookie jwt
fn bearer_or_cookie(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => cookie_token(req),
    }
}

fn cookie_token(req: &HttpRequest) -> Option<String> {
    req.cookie(JWT_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

fn app_state(req: &HttpRequest) -> Option<web::Data<AppState>> {
    req.app_data::<web::Data<AppState>>().cloned()
}

/// Vérifie le token puis l'état de l'utilisateur qu'il désigne
pub async fn authenticate(state: &AppState, token: &str) -> Result<users::Model, AppError> {
    // 1. Vérifier la signature et l'expiration
    let claims = jwt::verify_token(token, &state.config.jwt_secret)?;

    // 2. L'utilisateur existe toujours (et n'est pas désactivé)
    let user = users::Entity::find_active()
        .filter(users::Column::Id.eq(claims.sub))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::unauthorized("The user belonging to this token does no longer exist.")
        })?;

    // 3. Le mot de passe n'a pas changé depuis l'émission du token
    if user.changed_password_after(claims.iat) {
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }

    Ok(user)
}

async fn protect(state: Option<web::Data<AppState>>, token: Option<String>) -> Result<users::Model, AppError> {
    let state = state.ok_or_else(|| AppError::Internal("AppState is not registered".to_string()))?;
    let token = token.ok_or_else(|| {
        AppError::unauthorized("You are not logged in! Please log in to get access.")
    })?;

    authenticate(&state, &token).await
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_or_cookie(req);

        Box::pin(async move {
            let user = protect(state, token).await?;
            Ok(AuthUser { user })
        })
    }
}

/// Même contrôle que AuthUser, mais l'échec est rendu en page HTML
#[derive(Debug, Clone)]
pub struct PageUser {
    pub user: users::Model,
}

impl FromRequest for PageUser {
    type Error = PageError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_or_cookie(req);

        Box::pin(async move {
            let user = protect(state, token).await?;
            Ok(PageUser { user })
        })
    }
}

/// Utilisateur connecté si le cookie est valide ("isLoggedIn"), n'échoue jamais
#[derive(Debug, Clone, Default)]
pub struct OptionalUser(pub Option<users::Model>);

impl FromRequest for OptionalUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = cookie_token(req);

        Box::pin(async move {
            let (Some(state), Some(token)) = (state, token) else {
                return Ok(OptionalUser(None));
            };

            match authenticate(&state, &token).await {
                Ok(user) => Ok(OptionalUser(Some(user))),
                Err(e) => {
                    debug!("Ignoring invalid session cookie: {}", e);
                    Ok(OptionalUser(None))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_user, test_state, test_state_with};
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn token_for(state: &AppState, user_id: i32) -> String {
        jwt::generate_token(user_id, &state.config.jwt_secret, Duration::days(1)).unwrap()
    }

    fn db_returning(users: Vec<users::Model>) -> sea_orm::DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([users])
            .into_connection()
    }

    #[actix_web::test]
    async fn test_missing_token() {
        let state = web::Data::new(test_state());
        let req = TestRequest::default().app_data(state).to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.translate().status.as_u16(), 401);
        assert_eq!(
            err.translate().message,
            "You are not logged in! Please log in to get access."
        );
    }

    #[actix_web::test]
    async fn test_bearer_token_authenticates() {
        let state = test_state_with(db_returning(vec![sample_user()]));
        let token = token_for(&state, 1);
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .app_data(web::Data::new(state))
            .to_http_request();

        let auth = AuthUser::extract(&req).await.unwrap();
        assert_eq!(auth.id(), 1);
    }

    #[actix_web::test]
    async fn test_cookie_token_authenticates() {
        let state = test_state_with(db_returning(vec![sample_user()]));
        let token = token_for(&state, 1);
        let req = TestRequest::default()
            .cookie(Cookie::new(JWT_COOKIE, token))
            .app_data(web::Data::new(state))
            .to_http_request();

        assert!(AuthUser::extract(&req).await.is_ok());
    }

    #[actix_web::test]
    async fn test_deleted_user_is_rejected() {
        let state = test_state_with(db_returning(vec![]));
        let token = token_for(&state, 1);
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .app_data(web::Data::new(state))
            .to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(
            err.translate().message,
            "The user belonging to this token does no longer exist."
        );
    }

    #[actix_web::test]
    async fn test_token_issued_before_password_change_is_rejected() {
        let mut user = sample_user();
        user.password_changed_at = Some(Utc::now() + Duration::minutes(5));
        let state = test_state_with(db_returning(vec![user]));
        let token = token_for(&state, 1);
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .app_data(web::Data::new(state))
            .to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(
            err.translate().message,
            "User recently changed password! Please log in again."
        );
    }

    #[actix_web::test]
    async fn test_logged_out_cookie_is_invalid_token() {
        let state = web::Data::new(test_state());
        let req = TestRequest::default()
            .cookie(Cookie::new(JWT_COOKIE, "loggedout"))
            .app_data(state)
            .to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.translate().message, "Invalid token. Please log in again!");
    }

    #[actix_web::test]
    async fn test_optional_user_never_fails() {
        let state = web::Data::new(test_state());
        let req = TestRequest::default()
            .cookie(Cookie::new(JWT_COOKIE, "loggedout"))
            .app_data(state)
            .to_http_request();

        let OptionalUser(user) = OptionalUser::extract(&req).await.unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn test_restrict_to() {
        let auth = AuthUser { user: sample_user() };

        assert!(auth.restrict_to(&[Role::User, Role::Admin]).is_ok());
        let err = auth.restrict_to(&[Role::Admin, Role::LeadGuide]).unwrap_err();
        assert_eq!(err.translate().status.as_u16(), 403);
    }
}

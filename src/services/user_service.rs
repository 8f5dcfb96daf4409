use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::info;

use crate::error::AppError;
use crate::models::dto::{SignupRequest, UpdateUserRequest};
use crate::models::users::{self, Role};
use crate::utils::api_features::{ApiFeatures, Projection, QueryParams};
use crate::utils::password;

pub struct UserService;

const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Normalisation appliquée avant toute écriture d'un email
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hook "pre-save" du mot de passe : hash + date de changement pour un user existant
fn set_password(active: &mut users::ActiveModel, plain: &str, existing: bool) -> Result<(), AppError> {
    active.password = Set(password::hash_password(plain)?);
    if existing {
        active.password_changed_at = Set(Some(users::password_changed_timestamp(Utc::now())));
    }
    Ok(())
}

impl UserService {
    /// Inscription (rôle user, photo par défaut)
    pub async fn create(db: &DatabaseConnection, request: &SignupRequest) -> Result<users::Model, AppError> {
        let mut user = users::ActiveModel {
            name: Set(request.name.trim().to_string()),
            email: Set(normalize_email(&request.email)),
            photo: Set("default.jpg".to_string()),
            role: Set(Role::User),
            active: Set(true),
            created_at: Set(Utc::now()),
            password_changed_at: Set(None),
            password_reset_token: Set(None),
            password_reset_expires: Set(None),
            ..Default::default()
        };
        set_password(&mut user, &request.password, false)?;

        let user = user.insert(db).await?;
        info!(user_id = user.id, "New user signed up");
        Ok(user)
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> Result<users::Model, AppError> {
        users::Entity::find_active()
            .filter(users::Column::Id.eq(id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("No user found with that ID"))
    }

    pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find_active()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(db)
            .await?)
    }

    /// Vérifie les identifiants ; un compte désactivé ne peut pas se connecter
    pub async fn login(db: &DatabaseConnection, email: &str, password: &str) -> Result<users::Model, AppError> {
        let incorrect = || AppError::unauthorized("Incorrect email or password");

        let user = Self::find_by_email(db, email).await?.ok_or_else(incorrect)?;
        if !password::verify_password(password, &user.password)? {
            return Err(incorrect());
        }
        Ok(user)
    }

    pub async fn list(db: &DatabaseConnection, params: QueryParams) -> Result<(Vec<users::Model>, Projection), AppError> {
        let (select, projection) = ApiFeatures::new(users::Entity::find_active(), params)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .into_parts();

        Ok((select.all(db).await?, projection))
    }

    /// updateMe : seuls name, email et photo sont modifiables
    pub async fn update_profile(
        db: &DatabaseConnection,
        user: users::Model,
        name: Option<String>,
        email: Option<String>,
        photo: Option<String>,
    ) -> Result<users::Model, AppError> {
        let mut active: users::ActiveModel = user.into();
        if let Some(name) = name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = email {
            active.email = Set(normalize_email(&email));
        }
        if let Some(photo) = photo {
            active.photo = Set(photo);
        }

        Ok(active.update(db).await?)
    }

    /// Mise à jour admin (jamais le mot de passe)
    pub async fn update(db: &DatabaseConnection, id: i32, request: UpdateUserRequest) -> Result<users::Model, AppError> {
        let user = Self::find_by_id(db, id).await?;

        let mut active: users::ActiveModel = user.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = request.email {
            active.email = Set(normalize_email(&email));
        }
        if let Some(photo) = request.photo {
            active.photo = Set(photo);
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }

        Ok(active.update(db).await?)
    }

    /// deleteMe : soft delete
    pub async fn deactivate(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
        users::Entity::update_many()
            .col_expr(users::Column::Active, Expr::value(false))
            .filter(users::Column::Id.eq(user_id))
            .exec(db)
            .await?;

        info!(user_id, "User deactivated");
        Ok(())
    }

    /// Suppression définitive (admin)
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let result = users::Entity::delete_many()
            .filter(users::Column::Id.eq(id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found("No user found with that ID"));
        }
        Ok(())
    }

    pub async fn change_password(
        db: &DatabaseConnection,
        user: users::Model,
        current: &str,
        new_password: &str,
    ) -> Result<users::Model, AppError> {
        // 1. Vérifier le mot de passe actuel
        if !password::verify_password(current, &user.password)? {
            return Err(AppError::unauthorized("Your current password is wrong."));
        }

        // 2. Hook pre-save : hash + password_changed_at
        let mut active: users::ActiveModel = user.into();
        set_password(&mut active, new_password, true)?;

        Ok(active.update(db).await?)
    }

    /// Génère un token de reset ; seul son digest est stocké. Retourne le token en clair
    pub async fn create_reset_token(db: &DatabaseConnection, user: users::Model) -> Result<String, AppError> {
        let (plain, digest) = password::new_reset_token();

        let mut active: users::ActiveModel = user.into();
        active.password_reset_token = Set(Some(digest));
        active.password_reset_expires = Set(Some(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)));
        active.update(db).await?;

        Ok(plain)
    }

    pub async fn clear_reset_token(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
        users::Entity::update_many()
            .col_expr(users::Column::PasswordResetToken, Expr::value(Option::<String>::None))
            .col_expr(
                users::Column::PasswordResetExpires,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Rachète un token de reset : digest + expiration, puis invalidation
    pub async fn reset_password(db: &DatabaseConnection, plain_token: &str, new_password: &str) -> Result<users::Model, AppError> {
        // 1. Trouver l'utilisateur par digest, token non expiré
        let user = users::Entity::find_active()
            .filter(users::Column::PasswordResetToken.eq(password::hash_reset_token(plain_token)))
            .filter(users::Column::PasswordResetExpires.gt(Utc::now()))
            .one(db)
            .await?
            .ok_or_else(|| AppError::bad_request("Token is invalid or has expired"))?;

        // 2. Nouveau mot de passe, token invalidé
        let mut active: users::ActiveModel = user.into();
        set_password(&mut active, new_password, true)?;
        active.password_reset_token = Set(None);
        active.password_reset_expires = Set(None);

        Ok(active.update(db).await?)
    }
}

// ============================================================================
// MODÈLE : USERS
// ============================================================================
//
// Colonnes de la table users:
//   - id (SERIAL, PRIMARY KEY)
//   - name, email (UNIQUE, minuscules), photo (défaut "default.jpg")
//   - role : user | guide | lead-guide | admin
//   - password : hash PBKDF2, jamais sérialisé
//   - password_changed_at : sert à invalider les JWT émis avant le changement
//   - password_reset_token : digest SHA-256 du token envoyé par email
//   - password_reset_expires : now + 10 minutes
//   - active : false = compte désactivé (soft delete)
//
// Points d'attention:
//   - Les requêtes par défaut passent par `find_active()` (active = true)
//   - Les colonnes sensibles sont marquées `skip_serializing`
//
// ============================================================================

use chrono::{DateTime, Utc};
use sea_orm::Select;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::api_features::{FieldKind, Queryable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "guide")]
    Guide,
    #[sea_orm(string_value = "lead-guide")]
    LeadGuide,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn is_any_of(self, allowed: &[Role]) -> bool {
        allowed.contains(&self)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub photo: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTimeUtc>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTimeUtc>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Review,

    #[sea_orm(has_many = "super::booking::Entity")]
    Booking,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Requête par défaut : les comptes désactivés n'existent pas pour l'API
    pub fn find_active() -> Select<Entity> {
        Self::find().filter(Column::Active.eq(true))
    }
}

impl Queryable for Entity {
    fn field(name: &str) -> Option<(Column, FieldKind)> {
        let field = match name {
            "id" => (Column::Id, FieldKind::Integer),
            "name" => (Column::Name, FieldKind::Text),
            "email" => (Column::Email, FieldKind::Text),
            "role" => (Column::Role, FieldKind::Text),
            "createdAt" => (Column::CreatedAt, FieldKind::DateTime),
            _ => return None,
        };
        Some(field)
    }

    fn id_column() -> Column {
        Column::Id
    }
}

impl Model {
    /// Vrai si le mot de passe a changé après l'émission du token (iat en secondes)
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => issued_at < changed_at.timestamp(),
            None => false,
        }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Utilisé pour le calcul de `changed_password_after` : on recule d'une seconde
/// pour que le token émis juste après le changement reste valide
pub fn password_changed_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::seconds(1)
}

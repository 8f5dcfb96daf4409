// ============================================================================
// MODÈLE : BOOKINGS
// ============================================================================
//
// Une réservation relie un user à un tour et garde le prix réellement payé.
// Créée par le webhook de paiement (checkout.session.completed) ou par un
// admin via l'API.
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::api_features::{FieldKind, Queryable};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[serde(rename = "tour")]
    pub tour_id: i32,
    #[serde(rename = "user")]
    pub user_id: i32,
    pub price: Decimal,
    pub created_at: DateTimeUtc,
    pub paid: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tour::Entity",
        from = "Column::TourId",
        to = "super::tour::Column::Id",
        on_delete = "Cascade"
    )]
    Tour,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::tour::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tour.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Queryable for Entity {
    fn field(name: &str) -> Option<(Column, FieldKind)> {
        let field = match name {
            "id" => (Column::Id, FieldKind::Integer),
            "tour" => (Column::TourId, FieldKind::Integer),
            "user" => (Column::UserId, FieldKind::Integer),
            "price" => (Column::Price, FieldKind::Decimal),
            "paid" => (Column::Paid, FieldKind::Boolean),
            "createdAt" => (Column::CreatedAt, FieldKind::DateTime),
            _ => return None,
        };
        Some(field)
    }

    fn id_column() -> Column {
        Column::Id
    }
}

// ============================================================================
// MODÈLE : REVIEWS
// ============================================================================
//
// Colonnes de la table reviews:
//   - id (SERIAL, PRIMARY KEY)
//   - review (TEXT, NOT NULL)
//   - rating (INTEGER, 1..=5)
//   - created_at
//   - tour_id (FK tours, ON DELETE CASCADE)
//   - user_id (FK users, ON DELETE CASCADE)
//
// Points d'attention:
//   - Index UNIQUE (tour_id, user_id) : une seule review par user et par tour
//     (créé par db::sync_schema)
//   - Toute écriture doit être suivie de ReviewService::calc_average_ratings
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::api_features::{FieldKind, Queryable};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub review: String,
    pub rating: i32,
    pub created_at: DateTimeUtc,
    #[serde(rename = "tour")]
    pub tour_id: i32,
    #[serde(rename = "user")]
    pub user_id: i32,
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
            "rating" => (Column::Rating, FieldKind::Integer),
            "tour" => (Column::TourId, FieldKind::Integer),
            "user" => (Column::UserId, FieldKind::Integer),
            "createdAt" => (Column::CreatedAt, FieldKind::DateTime),
            _ => return None,
        };
        Some(field)
    }

    fn id_column() -> Column {
        Column::Id
    }
}

/// Nombre de reviews et moyenne arrondie à une décimale.
/// Sans review : (0, 4.5)
pub fn compute_rating_stats(ratings: &[i32]) -> (i32, f64) {
    if ratings.is_empty() {
        return (0, 4.5);
    }

    let count = ratings.len() as i32;
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let average = sum as f64 / f64::from(count);

    (count, super::tour::round_rating(average))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_rating_stats() {
        assert_eq!(compute_rating_stats(&[5, 4, 5]), (3, 4.7));
        assert_eq!(compute_rating_stats(&[1]), (1, 1.0));
    }

    #[test]
    fn test_compute_rating_stats_without_reviews() {
        assert_eq!(compute_rating_stats(&[]), (0, 4.5));
    }
}

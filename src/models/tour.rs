// ============================================================================
// MODÈLE : TOURS
// ============================================================================
//
// Les données "embarquées" (dates de départ, images, localisations) sont
// stockées en JSONB via des newtypes `FromJsonQueryResult`.
//
// Points d'attention:
//   - slug calculé à partir du nom (hook dans TourService)
//   - ratings_average / ratings_quantity sont dérivés des reviews, jamais
//     modifiés directement par l'API
//   - secret_tour = true : invisible pour toutes les requêtes par défaut
//   - coordinates au format [longitude, latitude]
//
// ============================================================================

use sea_orm::entity::prelude::*;
use sea_orm::{FromJsonQueryResult, Select};
use serde::{Deserialize, Serialize};

use crate::utils::api_features::{FieldKind, Queryable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[sea_orm(string_value = "easy")]
    Easy,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "difficult")]
    Difficult,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "difficult" => Some(Difficulty::Difficult),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

fn point() -> String {
    "Point".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point")]
    pub kind: String,
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

impl GeoPoint {
    /// (lat, lng) si les coordonnées sont complètes
    pub fn lat_lng(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lng, lat, ..] => Some((*lat, *lng)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct DateList(pub Vec<DateTimeUtc>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Locations(pub Vec<GeoPoint>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tours")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: Decimal,
    pub price_discount: Option<Decimal>,
    pub summary: String,
    #[sea_orm(column_type = "Text")]
    pub description: Option<String>,
    pub image_cover: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub images: StringList,
    #[serde(skip_serializing)]
    pub created_at: DateTimeUtc,
    #[sea_orm(column_type = "JsonBinary")]
    pub start_dates: DateList,
    pub secret_tour: bool,
    #[sea_orm(column_type = "JsonBinary")]
    pub start_location: Option<GeoPoint>,
    #[sea_orm(column_type = "JsonBinary")]
    pub locations: Locations,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Review,

    #[sea_orm(has_many = "super::booking::Entity")]
    Booking,

    #[sea_orm(has_many = "super::tour_guide::Entity")]
    TourGuide,
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

impl Related<super::tour_guide::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourGuide.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Requête par défaut : les tours secrets sont exclus
    pub fn find_visible() -> Select<Entity> {
        Self::find().filter(Column::SecretTour.eq(false))
    }
}

impl Queryable for Entity {
    fn field(name: &str) -> Option<(Column, FieldKind)> {
        let field = match name {
            "id" => (Column::Id, FieldKind::Integer),
            "name" => (Column::Name, FieldKind::Text),
            "slug" => (Column::Slug, FieldKind::Text),
            "duration" => (Column::Duration, FieldKind::Integer),
            "maxGroupSize" => (Column::MaxGroupSize, FieldKind::Integer),
            "difficulty" => (Column::Difficulty, FieldKind::Text),
            "ratingsAverage" => (Column::RatingsAverage, FieldKind::Float),
            "ratingsQuantity" => (Column::RatingsQuantity, FieldKind::Integer),
            "price" => (Column::Price, FieldKind::Decimal),
            "priceDiscount" => (Column::PriceDiscount, FieldKind::Decimal),
            "summary" => (Column::Summary, FieldKind::Text),
            "createdAt" => (Column::CreatedAt, FieldKind::DateTime),
            _ => return None,
        };
        Some(field)
    }

    fn id_column() -> Column {
        Column::Id
    }

    fn multi_valued(name: &str) -> bool {
        matches!(
            name,
            "duration" | "ratingsQuantity" | "ratingsAverage" | "maxGroupSize" | "difficulty" | "price"
        )
    }
}

impl Model {
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }
}

/// Arrondi à une décimale (4.666 -> 4.7)
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

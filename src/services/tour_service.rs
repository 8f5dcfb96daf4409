// ============================================================================
// SERVICE : TOURS
// ============================================================================
//
// Hooks appliqués ici (et nulle part ailleurs) :
//   - pre-save   : slug = slugify(name), priceDiscount < price
//   - pre-find   : tours secrets exclus (tour::Entity::find_visible)
//   - populate   : guides (table tour_guides) et reviews pour GET /tours/{id}
//
// Les agrégations (stats, monthly plan, géo) sont calculées en Rust sur les
// tours visibles : le volume de tours reste faible.
//
// ============================================================================

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::error::AppError;
use crate::models::dto::{CreateTourRequest, TourResponse, UpdateTourRequest};
use crate::models::tour::{self, DateList, Difficulty, Locations, StringList};
use crate::models::{tour_guide, users};
use crate::services::review_service::ReviewService;
use crate::utils::api_features::{ApiFeatures, Projection, QueryParams};
use crate::utils::geo::{self, Unit};

pub struct TourService;

/// Une ligne de /tours/tour-stats (groupée par difficulté)
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    #[serde(rename = "_id")]
    pub difficulty: String,
    pub num_tours: usize,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

/// Une ligne de /tours/monthly-plan/{year}
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: u32,
    pub num_tour_starts: usize,
    pub tours: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TourDistance {
    pub id: i32,
    pub name: String,
    pub distance: f64,
}

const TOP_RATED_THRESHOLD: f64 = 4.5;
const MONTHLY_PLAN_LIMIT: usize = 12;

fn required<T>(value: Option<T>, message: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::bad_request(message))
}

fn parse_difficulty(raw: &str) -> Result<Difficulty, AppError> {
    Difficulty::parse(raw)
        .ok_or_else(|| AppError::bad_request("Difficulty is either: easy, medium, difficult"))
}

/// Validation "priceDiscount < price"
pub fn check_discount(price: Decimal, discount: Option<Decimal>) -> Result<(), AppError> {
    match discount {
        Some(discount) if discount >= price => Err(AppError::bad_request(format!(
            "Discount price ({}) should be below regular price",
            discount
        ))),
        _ => Ok(()),
    }
}

impl TourService {
    pub async fn list(
        db: &DatabaseConnection,
        params: QueryParams,
    ) -> Result<(Vec<TourResponse>, Projection), AppError> {
        let (select, projection) = ApiFeatures::new(tour::Entity::find_visible(), params)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .into_parts();

        let tours = select.all(db).await?;
        Ok((Self::populate_guides(db, tours).await?, projection))
    }

    /// Tour visible par id, sans population
    pub async fn find_model(db: &DatabaseConnection, id: i32) -> Result<tour::Model, AppError> {
        tour::Entity::find_visible()
            .filter(tour::Column::Id.eq(id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("No tour found with that ID"))
    }

    /// GET /tours/{id} : guides + reviews
    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<TourResponse, AppError> {
        let tour = Self::find_model(db, id).await?;
        Self::with_details(db, tour).await
    }

    /// Page de détail : même population que `find`
    pub async fn find_by_slug(db: &DatabaseConnection, slug: &str) -> Result<Option<TourResponse>, AppError> {
        let tour = tour::Entity::find_visible()
            .filter(tour::Column::Slug.eq(slug))
            .one(db)
            .await?;

        match tour {
            Some(tour) => Ok(Some(Self::with_details(db, tour).await?)),
            None => Ok(None),
        }
    }

    async fn with_details(db: &DatabaseConnection, tour: tour::Model) -> Result<TourResponse, AppError> {
        let mut guides = Self::load_guides(db, &[tour.id]).await?;
        let reviews = ReviewService::for_tour(db, tour.id).await?;

        let guides = guides.remove(&tour.id).unwrap_or_default();
        Ok(TourResponse::new(tour, guides).with_reviews(reviews))
    }

    pub async fn create(db: &DatabaseConnection, request: CreateTourRequest) -> Result<TourResponse, AppError> {
        // 1. Champs requis (déjà validés) et hook pre-save
        let name = required(request.name, "A tour must have a name")?.trim().to_string();
        let price = required(request.price, "A tour must have a price")?;
        check_discount(price, request.price_discount)?;
        let difficulty = parse_difficulty(&required(request.difficulty, "A tour must have a difficulty")?)?;

        let model = tour::ActiveModel {
            slug: Set(slug::slugify(&name)),
            name: Set(name),
            duration: Set(required(request.duration, "A tour must have a duration")?),
            max_group_size: Set(required(request.max_group_size, "A tour must have a group size")?),
            difficulty: Set(difficulty),
            ratings_average: Set(request.ratings_average.map(tour::round_rating).unwrap_or(4.5)),
            ratings_quantity: Set(0),
            price: Set(price),
            price_discount: Set(request.price_discount),
            summary: Set(required(request.summary, "A tour must have a summary")?.trim().to_string()),
            description: Set(request.description.map(|d| d.trim().to_string())),
            image_cover: Set(required(request.image_cover, "A tour must have a cover image")?),
            images: Set(StringList(request.images)),
            created_at: Set(Utc::now()),
            start_dates: Set(DateList(request.start_dates)),
            secret_tour: Set(request.secret_tour),
            start_location: Set(request.start_location),
            locations: Set(Locations(request.locations)),
            ..Default::default()
        };

        // 2. Tour + guides dans la même transaction
        let txn = db.begin().await?;
        let tour = model.insert(&txn).await?;
        Self::insert_guides(&txn, tour.id, &request.guides).await?;
        txn.commit().await?;

        info!(tour_id = tour.id, name = %tour.name, "Tour created");

        // 3. Réponse populée
        let mut guides = Self::load_guides(db, &[tour.id]).await?;
        let guides = guides.remove(&tour.id).unwrap_or_default();
        Ok(TourResponse::new(tour, guides))
    }

    pub async fn update(db: &DatabaseConnection, id: i32, request: UpdateTourRequest) -> Result<TourResponse, AppError> {
        let tour = Self::find_model(db, id).await?;

        // 1. Le discount est comparé au prix final
        let price = request.price.unwrap_or(tour.price);
        let discount = request.price_discount.or(tour.price_discount);
        check_discount(price, discount)?;

        // 2. Appliquer les champs fournis
        let mut active: tour::ActiveModel = tour.into();
        if let Some(name) = request.name {
            let name = name.trim().to_string();
            active.slug = Set(slug::slugify(&name));
            active.name = Set(name);
        }
        if let Some(duration) = request.duration {
            active.duration = Set(duration);
        }
        if let Some(size) = request.max_group_size {
            active.max_group_size = Set(size);
        }
        if let Some(difficulty) = request.difficulty {
            active.difficulty = Set(parse_difficulty(&difficulty)?);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if request.price_discount.is_some() {
            active.price_discount = Set(request.price_discount);
        }
        if let Some(summary) = request.summary {
            active.summary = Set(summary.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description.trim().to_string()));
        }
        if let Some(cover) = request.image_cover {
            active.image_cover = Set(cover);
        }
        if let Some(images) = request.images {
            active.images = Set(StringList(images));
        }
        if let Some(dates) = request.start_dates {
            active.start_dates = Set(DateList(dates));
        }
        if let Some(secret) = request.secret_tour {
            active.secret_tour = Set(secret);
        }
        if let Some(location) = request.start_location {
            active.start_location = Set(Some(location));
        }
        if let Some(locations) = request.locations {
            active.locations = Set(Locations(locations));
        }

        // 3. Sauvegarde, guides remplacés si fournis
        let txn = db.begin().await?;
        let tour = active.update(&txn).await?;
        if let Some(guides) = request.guides {
            tour_guide::Entity::delete_many()
                .filter(tour_guide::Column::TourId.eq(tour.id))
                .exec(&txn)
                .await?;
            Self::insert_guides(&txn, tour.id, &guides).await?;
        }
        txn.commit().await?;

        let mut guides = Self::load_guides(db, &[tour.id]).await?;
        let guides = guides.remove(&tour.id).unwrap_or_default();
        Ok(TourResponse::new(tour, guides))
    }

    /// Les reviews, bookings et guides suivent par cascade
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let result = tour::Entity::delete_many()
            .filter(tour::Column::Id.eq(id))
            .filter(tour::Column::SecretTour.eq(false))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found("No tour found with that ID"));
        }
        info!(tour_id = id, "Tour deleted");
        Ok(())
    }

    async fn insert_guides<C: ConnectionTrait>(db: &C, tour_id: i32, guides: &[i32]) -> Result<(), AppError> {
        let mut ids = guides.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(());
        }

        let rows = ids.into_iter().map(|user_id| tour_guide::ActiveModel {
            tour_id: Set(tour_id),
            user_id: Set(user_id),
        });
        tour_guide::Entity::insert_many(rows).exec_without_returning(db).await?;
        Ok(())
    }

    /// Guides actifs par tour ; aucune requête si rien à charger
    async fn load_guides(
        db: &DatabaseConnection,
        tour_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<users::Model>>, AppError> {
        let mut by_tour: HashMap<i32, Vec<users::Model>> = HashMap::new();
        if tour_ids.is_empty() {
            return Ok(by_tour);
        }

        let links = tour_guide::Entity::find()
            .filter(tour_guide::Column::TourId.is_in(tour_ids.iter().copied()))
            .all(db)
            .await?;
        if links.is_empty() {
            return Ok(by_tour);
        }

        let guides: HashMap<i32, users::Model> = users::Entity::find_active()
            .filter(users::Column::Id.is_in(links.iter().map(|l| l.user_id)))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        for link in links {
            if let Some(guide) = guides.get(&link.user_id) {
                by_tour.entry(link.tour_id).or_default().push(guide.clone());
            }
        }
        Ok(by_tour)
    }

    pub async fn populate_guides(
        db: &DatabaseConnection,
        tours: Vec<tour::Model>,
    ) -> Result<Vec<TourResponse>, AppError> {
        let ids: Vec<i32> = tours.iter().map(|t| t.id).collect();
        let mut guides = Self::load_guides(db, &ids).await?;

        Ok(tours
            .into_iter()
            .map(|tour| {
                let tour_guides = guides.remove(&tour.id).unwrap_or_default();
                TourResponse::new(tour, tour_guides)
            })
            .collect())
    }

    /// Tours visibles par id (population des bookings)
    pub async fn find_many(db: &DatabaseConnection, ids: &[i32]) -> Result<HashMap<i32, tour::Model>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(tour::Entity::find_visible()
            .filter(tour::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect())
    }

    pub async fn tour_stats(db: &DatabaseConnection) -> Result<Vec<TourStats>, AppError> {
        let tours = tour::Entity::find_visible()
            .filter(tour::Column::RatingsAverage.gte(TOP_RATED_THRESHOLD))
            .all(db)
            .await?;
        Ok(compute_tour_stats(&tours))
    }

    pub async fn monthly_plan(db: &DatabaseConnection, year: i32) -> Result<Vec<MonthlyPlan>, AppError> {
        let tours = tour::Entity::find_visible().all(db).await?;
        Ok(compute_monthly_plan(&tours, year))
    }

    /// Tours dont le point de départ est dans le cercle (distance en `unit`)
    pub async fn tours_within(
        db: &DatabaseConnection,
        distance: f64,
        center: (f64, f64),
        unit: Unit,
    ) -> Result<Vec<tour::Model>, AppError> {
        let tours = tour::Entity::find_visible().all(db).await?;

        Ok(tours
            .into_iter()
            .filter(|t| {
                t.start_location
                    .as_ref()
                    .and_then(|p| p.lat_lng())
                    .is_some_and(|point| geo::within(center, point, distance, unit))
            })
            .collect())
    }

    /// Distance de chaque tour au centre, la plus proche en premier
    pub async fn distances(
        db: &DatabaseConnection,
        center: (f64, f64),
        unit: Unit,
    ) -> Result<Vec<TourDistance>, AppError> {
        let tours = tour::Entity::find_visible().all(db).await?;
        Ok(compute_distances(&tours, center, unit))
    }
}

pub fn compute_tour_stats(tours: &[tour::Model]) -> Vec<TourStats> {
    let mut groups: BTreeMap<&'static str, Vec<&tour::Model>> = BTreeMap::new();
    for t in tours.iter().filter(|t| t.ratings_average >= TOP_RATED_THRESHOLD) {
        groups.entry(t.difficulty.as_str()).or_default().push(t);
    }

    let mut stats: Vec<TourStats> = groups
        .into_iter()
        .filter_map(|(difficulty, group)| {
            let count = group.len();
            let total: Decimal = group.iter().map(|t| t.price).sum();
            let avg_rating = group.iter().map(|t| t.ratings_average).sum::<f64>() / count as f64;

            Some(TourStats {
                difficulty: difficulty.to_uppercase(),
                num_tours: count,
                num_ratings: group.iter().map(|t| i64::from(t.ratings_quantity)).sum(),
                avg_rating,
                avg_price: total / Decimal::from(count as u64),
                min_price: group.iter().map(|t| t.price).min()?,
                max_price: group.iter().map(|t| t.price).max()?,
            })
        })
        .collect();

    stats.sort_by(|a, b| a.avg_price.cmp(&b.avg_price));
    stats
}

pub fn compute_monthly_plan(tours: &[tour::Model], year: i32) -> Vec<MonthlyPlan> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for t in tours {
        for date in t.start_dates.0.iter().filter(|d| d.year() == year) {
            months.entry(date.month()).or_default().push(t.name.clone());
        }
    }

    let mut plan: Vec<MonthlyPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthlyPlan {
            month,
            num_tour_starts: tours.len(),
            tours,
        })
        .collect();

    // Plus de départs d'abord ; à égalité, ordre du calendrier
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts).then(a.month.cmp(&b.month)));
    plan.truncate(MONTHLY_PLAN_LIMIT);
    plan
}

pub fn compute_distances(tours: &[tour::Model], center: (f64, f64), unit: Unit) -> Vec<TourDistance> {
    let mut distances: Vec<TourDistance> = tours
        .iter()
        .filter_map(|t| {
            let point = t.start_location.as_ref()?.lat_lng()?;
            Some(TourDistance {
                id: t.id,
                name: t.name.clone(),
                distance: unit.from_meters(geo::haversine_meters(center, point)),
            })
        })
        .collect();

    distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    distances
}

use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::dto::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest};
use crate::models::review::{self, compute_rating_stats};
use crate::models::users::{self, Role};
use crate::models::tour;
use crate::utils::api_features::{ApiFeatures, Projection, QueryParams};

pub struct ReviewService;

impl ReviewService {
    /// GET /reviews ou /tours/{tourId}/reviews
    pub async fn list(
        db: &DatabaseConnection,
        tour_id: Option<i32>,
        params: QueryParams,
    ) -> Result<(Vec<ReviewResponse>, Projection), AppError> {
        let mut select = review::Entity::find();
        if let Some(tour_id) = tour_id {
            select = select.filter(review::Column::TourId.eq(tour_id));
        }

        let (select, projection) = ApiFeatures::new(select, params)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .into_parts();

        let reviews = select.all(db).await?;
        Ok((Self::populate_authors(db, reviews).await?, projection))
    }

    pub async fn find_model(db: &DatabaseConnection, id: i32) -> Result<review::Model, AppError> {
        review::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("No review found with that ID"))
    }

    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<ReviewResponse, AppError> {
        let review = Self::find_model(db, id).await?;
        Self::populate_one(db, review).await
    }

    /// Reviews d'un tour, plus récentes d'abord
    pub async fn for_tour(db: &DatabaseConnection, tour_id: i32) -> Result<Vec<ReviewResponse>, AppError> {
        let reviews = review::Entity::find()
            .filter(review::Column::TourId.eq(tour_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(db)
            .await?;
        Self::populate_authors(db, reviews).await
    }

    /// L'auteur vient toujours du token, jamais du corps
    pub async fn create(
        db: &DatabaseConnection,
        author: &users::Model,
        tour_id: Option<i32>,
        request: CreateReviewRequest,
    ) -> Result<ReviewResponse, AppError> {
        // 1. Le tour doit exister (et être visible)
        let tour_id = tour_id
            .or(request.tour)
            .ok_or_else(|| AppError::bad_request("Review must belong to a tour."))?;
        tour::Entity::find_visible()
            .filter(tour::Column::Id.eq(tour_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("No tour found with that ID"))?;

        // 2. Une seule review par (tour, user) ; l'index unique reste la garantie finale
        let existing = review::Entity::find()
            .filter(review::Column::TourId.eq(tour_id))
            .filter(review::Column::UserId.eq(author.id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(AppError::bad_request("You have already reviewed this tour"));
        }

        let review = review::ActiveModel {
            review: Set(request.review.unwrap_or_default().trim().to_string()),
            rating: Set(request.rating.unwrap_or_default()),
            created_at: Set(chrono::Utc::now()),
            tour_id: Set(tour_id),
            user_id: Set(author.id),
            ..Default::default()
        }
        .insert(db)
        .await?;

        // 3. Hook post-save
        Self::calc_average_ratings(db, tour_id).await?;

        info!(review_id = review.id, tour_id, "Review created");
        Ok(ReviewResponse::new(review, Some(author)))
    }

    /// Un non-admin ne touche qu'à ses propres reviews
    fn check_owner(review: &review::Model, user: &users::Model) -> Result<(), AppError> {
        if user.role == Role::Admin || review.user_id == user.id {
            Ok(())
        } else {
            Err(AppError::forbidden("You do not have permission to perform this action"))
        }
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        user: &users::Model,
        request: UpdateReviewRequest,
    ) -> Result<ReviewResponse, AppError> {
        let review = Self::find_model(db, id).await?;
        Self::check_owner(&review, user)?;

        let mut active: review::ActiveModel = review.into();
        if let Some(text) = request.review {
            active.review = Set(text.trim().to_string());
        }
        if let Some(rating) = request.rating {
            active.rating = Set(rating);
        }
        let review = active.update(db).await?;

        // Hook post-update
        Self::calc_average_ratings(db, review.tour_id).await?;

        Self::populate_one(db, review).await
    }

    pub async fn delete(db: &DatabaseConnection, id: i32, user: &users::Model) -> Result<(), AppError> {
        let review = Self::find_model(db, id).await?;
        Self::check_owner(&review, user)?;

        review::Entity::delete_by_id(review.id).exec(db).await?;

        // Hook post-delete
        Self::calc_average_ratings(db, review.tour_id).await?;
        Ok(())
    }

    /// Recalcule ratingsQuantity / ratingsAverage du tour à partir de ses reviews
    pub async fn calc_average_ratings(db: &DatabaseConnection, tour_id: i32) -> Result<(), AppError> {
        let ratings: Vec<i32> = review::Entity::find()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::TourId.eq(tour_id))
            .into_tuple()
            .all(db)
            .await?;

        let (quantity, average) = compute_rating_stats(&ratings);

        tour::Entity::update_many()
            .col_expr(tour::Column::RatingsQuantity, Expr::value(quantity))
            .col_expr(tour::Column::RatingsAverage, Expr::value(average))
            .filter(tour::Column::Id.eq(tour_id))
            .exec(db)
            .await?;

        debug!(tour_id, quantity, average, "Tour ratings recalculated");
        Ok(())
    }

    async fn populate_one(db: &DatabaseConnection, review: review::Model) -> Result<ReviewResponse, AppError> {
        let mut populated = Self::populate_authors(db, vec![review]).await?;
        populated
            .pop()
            .ok_or_else(|| AppError::Internal("Review vanished during population".to_string()))
    }

    /// Auteurs actifs : {id, name, photo}, null si le compte est désactivé
    async fn populate_authors(
        db: &DatabaseConnection,
        reviews: Vec<review::Model>,
    ) -> Result<Vec<ReviewResponse>, AppError> {
        if reviews.is_empty() {
            return Ok(Vec::new());
        }

        let authors: HashMap<i32, users::Model> = users::Entity::find_active()
            .filter(users::Column::Id.is_in(reviews.iter().map(|r| r.user_id)))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(reviews
            .into_iter()
            .map(|review| {
                let author = authors.get(&review.user_id);
                ReviewResponse::new(review, author)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_review, sample_tour, sample_user, sample_user_with};
    use serde_json::json;

    fn request(rating: i32) -> CreateReviewRequest {
        serde_json::from_value(json!({ "review": "Amazing tour!", "rating": rating, "user": 99 })).unwrap()
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[actix_web::test]
    async fn test_calc_average_ratings_updates_tour() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                std::collections::BTreeMap::from([("rating", Value::from(5))]),
                std::collections::BTreeMap::from([("rating", Value::from(4))]),
            ]])
            .append_exec_results([exec_ok()])
            .into_connection();

        ReviewService::calc_average_ratings(&db, 1).await.unwrap();

        let log = db.into_transaction_log();
        let update = format!("{:?}", log[1]);
        assert!(update.contains("ratings_quantity"));
        assert!(update.contains("Int(Some(2))"));
        assert!(update.contains("Double(Some(4.5))"));
    }

    #[actix_web::test]
    async fn test_calc_average_ratings_without_reviews_resets() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<std::collections::BTreeMap<&str, Value>>::new()])
            .append_exec_results([exec_ok()])
            .into_connection();

        ReviewService::calc_average_ratings(&db, 1).await.unwrap();

        let update = format!("{:?}", db.into_transaction_log()[1]);
        assert!(update.contains("Int(Some(0))"));
        assert!(update.contains("Double(Some(4.5))"));
    }

    #[actix_web::test]
    async fn test_create_uses_author_from_token() {
        let author = sample_user();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_tour(3, "The Forest Hiker")]])
            .append_query_results([Vec::<review::Model>::new()])
            .append_query_results([vec![sample_review(10, 3, author.id, 5)]])
            .append_query_results([vec![std::collections::BTreeMap::from([("rating", Value::from(5))])]])
            .append_exec_results([exec_ok()])
            .into_connection();

        let response = ReviewService::create(&db, &author, Some(3), request(5)).await.unwrap();

        assert_eq!(response.tour, 3);
        assert_eq!(response.user.unwrap().name, "Laura Wilson");
        let insert = format!("{:?}", db.into_transaction_log()[2]);
        assert!(insert.contains("INSERT INTO"));
        assert!(!insert.contains("Int(Some(99))"));
    }

    #[actix_web::test]
    async fn test_duplicate_review_is_rejected() {
        let author = sample_user();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_tour(3, "The Forest Hiker")]])
            .append_query_results([vec![sample_review(10, 3, author.id, 4)]])
            .into_connection();

        let err = ReviewService::create(&db, &author, Some(3), request(5)).await.unwrap_err();
        assert_eq!(err.translate().status.as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_create_on_unknown_tour() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<tour::Model>::new()])
            .into_connection();

        let err = ReviewService::create(&db, &sample_user(), Some(42), request(5)).await.unwrap_err();
        assert_eq!(err.translate().status.as_u16(), 404);
    }

    #[actix_web::test]
    async fn test_only_author_or_admin_can_delete() {
        let stranger = sample_user_with(2, "Lourdes Browning", Role::User);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_review(10, 3, 1, 4)]])
            .into_connection();

        let err = ReviewService::delete(&db, 10, &stranger).await.unwrap_err();
        assert_eq!(err.translate().status.as_u16(), 403);

        let admin = sample_user_with(5, "Jonas Schmedtmann", Role::Admin);
        assert!(ReviewService::check_owner(&sample_review(10, 3, 1, 4), &admin).is_ok());
    }

    #[actix_web::test]
    async fn test_delete_recalculates_ratings() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_review(10, 3, 1, 4)]])
            .append_exec_results([exec_ok()])
            .append_query_results([Vec::<std::collections::BTreeMap<&str, Value>>::new()])
            .append_exec_results([exec_ok()])
            .into_connection();

        ReviewService::delete(&db, 10, &sample_user()).await.unwrap();

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 4);
        assert!(format!("{:?}", log[3]).contains("UPDATE \\\"tours\\\""));
    }
}

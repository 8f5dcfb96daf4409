use chrono::Utc;
use sea_orm::*;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::dto::{BookingResponse, CreateBookingRequest, UpdateBookingRequest};
use crate::models::{booking, tour, users};
use crate::services::payment::CompletedCheckout;
use crate::services::tour_service::TourService;
use crate::utils::api_features::{ApiFeatures, Projection, QueryParams};

pub struct BookingService;

impl BookingService {
    pub async fn list(
        db: &DatabaseConnection,
        params: QueryParams,
    ) -> Result<(Vec<BookingResponse>, Projection), AppError> {
        let (select, projection) = ApiFeatures::new(booking::Entity::find(), params)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .into_parts();

        let bookings = select.all(db).await?;
        Ok((Self::populate(db, bookings).await?, projection))
    }

    pub async fn find_model(db: &DatabaseConnection, id: i32) -> Result<booking::Model, AppError> {
        booking::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("No booking found with that ID"))
    }

    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<BookingResponse, AppError> {
        let booking = Self::find_model(db, id).await?;
        Self::populate_one(db, booking).await
    }

    pub async fn create(db: &DatabaseConnection, request: CreateBookingRequest) -> Result<BookingResponse, AppError> {
        let booking = booking::ActiveModel {
            tour_id: Set(request.tour),
            user_id: Set(request.user),
            price: Set(request.price),
            created_at: Set(Utc::now()),
            paid: Set(request.paid.unwrap_or(true)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(booking_id = booking.id, tour_id = booking.tour_id, "Booking created");
        Self::populate_one(db, booking).await
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: UpdateBookingRequest,
    ) -> Result<BookingResponse, AppError> {
        let booking = Self::find_model(db, id).await?;

        let mut active: booking::ActiveModel = booking.into();
        if let Some(tour_id) = request.tour {
            active.tour_id = Set(tour_id);
        }
        if let Some(user_id) = request.user {
            active.user_id = Set(user_id);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(paid) = request.paid {
            active.paid = Set(paid);
        }

        let booking = active.update(db).await?;
        Self::populate_one(db, booking).await
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let result = booking::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found("No booking found with that ID"));
        }
        Ok(())
    }

    /// Réservation créée à partir d'un checkout.session.completed
    pub async fn create_from_checkout(
        db: &DatabaseConnection,
        checkout: &CompletedCheckout,
    ) -> Result<booking::Model, AppError> {
        // 1. Tour = client_reference_id
        let tour_id = checkout
            .client_reference_id
            .as_deref()
            .and_then(|raw| raw.parse::<i32>().ok())
            .ok_or_else(|| AppError::bad_request("Webhook error: missing or invalid client_reference_id"))?;

        // 2. User retrouvé par son email
        let email = checkout
            .customer_email
            .as_deref()
            .ok_or_else(|| AppError::bad_request("Webhook error: missing customer_email"))?;
        let user = users::Entity::find_active()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await?
            .ok_or_else(|| {
                warn!(email, "Checkout completed for an unknown user");
                AppError::not_found("No user found with that email")
            })?;

        // 3. Prix payé (centimes -> unités)
        let price = checkout
            .price()
            .ok_or_else(|| AppError::bad_request("Webhook error: missing amount_total"))?;

        let booking = booking::ActiveModel {
            tour_id: Set(tour_id),
            user_id: Set(user.id),
            price: Set(price),
            created_at: Set(Utc::now()),
            paid: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(booking_id = booking.id, tour_id, user_id = user.id, "Booking created from checkout");
        Ok(booking)
    }

    /// Tours réservés par un utilisateur (page "My bookings")
    pub async fn tours_booked_by(db: &DatabaseConnection, user_id: i32) -> Result<Vec<tour::Model>, AppError> {
        let tour_ids: Vec<i32> = booking::Entity::find()
            .select_only()
            .column(booking::Column::TourId)
            .filter(booking::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;

        let mut tours: Vec<tour::Model> = TourService::find_many(db, &tour_ids).await?.into_values().collect();
        tours.sort_by_key(|t| t.id);
        Ok(tours)
    }

    async fn populate_one(db: &DatabaseConnection, booking: booking::Model) -> Result<BookingResponse, AppError> {
        let mut populated = Self::populate(db, vec![booking]).await?;
        populated
            .pop()
            .ok_or_else(|| AppError::Internal("Booking vanished during population".to_string()))
    }

    /// Population user + nom du tour
    async fn populate(db: &DatabaseConnection, bookings: Vec<booking::Model>) -> Result<Vec<BookingResponse>, AppError> {
        if bookings.is_empty() {
            return Ok(Vec::new());
        }

        let tour_ids: Vec<i32> = bookings.iter().map(|b| b.tour_id).collect();
        let tours = TourService::find_many(db, &tour_ids).await?;

        let users: HashMap<i32, users::Model> = users::Entity::find_active()
            .filter(users::Column::Id.is_in(bookings.iter().map(|b| b.user_id)))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let tour = tours.get(&booking.tour_id);
                let user = users.get(&booking.user_id).cloned();
                BookingResponse::new(booking, tour, user)
            })
            .collect())
    }
}

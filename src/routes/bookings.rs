use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, web};
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{CreateBookingRequest, UpdateBookingRequest};
use crate::models::users::Role;
use crate::routes::{base_url, query_params};
use crate::services::booking_service::BookingService;
use crate::services::payment::CheckoutRequest;
use crate::services::tour_service::TourService;
use crate::state::AppState;
use crate::utils::response;

const BOOKING_MANAGERS: [Role; 2] = [Role::Admin, Role::LeadGuide];

/// GET /bookings/checkout-session/{tour_id} (PROTÉGÉE) - Session Stripe Checkout
#[get("/checkout-session/{tour_id}")]
pub async fn get_checkout_session(
    req: HttpRequest,
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    // 1. Tour réservé
    let tour = TourService::find_model(&state.db, path.into_inner()).await?;

    // 2. Créer la session de paiement
    let base = base_url(&req);
    let request = CheckoutRequest {
        tour_id: tour.id,
        tour_name: tour.name.clone(),
        summary: tour.summary.clone(),
        image_url: format!("{}/img/tours/{}", base, tour.image_cover),
        price: tour.price,
        customer_email: auth_user.user.email.clone(),
        success_url: format!("{}/my-tours?alert=booking", base),
        cancel_url: format!("{}/tour/{}", base, tour.slug),
    };
    let session = state.payments.create_checkout_session(&request).await?;

    info!(tour_id = tour.id, user_id = auth_user.id(), session = %session.id, "Checkout session created");

    // 3. Renvoyer la session au client
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "session": session,
    })))
}

/// GET /bookings (admin, lead-guide)
#[get("")]
pub async fn get_all_bookings(
    auth_user: AuthUser,
    query: web::Query<Vec<(String, String)>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&BOOKING_MANAGERS)?;

    let (bookings, projection) = BookingService::list(&state.db, query_params(query)).await?;
    response::list(bookings, &projection)
}

/// POST /bookings (admin, lead-guide)
#[post("")]
pub async fn create_booking(
    auth_user: AuthUser,
    body: web::Json<CreateBookingRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&BOOKING_MANAGERS)?;

    let booking = BookingService::create(&state.db, body.into_inner()).await?;
    Ok(response::created(booking))
}

/// GET /bookings/{id} (admin, lead-guide)
#[get("/{id}")]
pub async fn get_booking(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&BOOKING_MANAGERS)?;

    let booking = BookingService::find(&state.db, path.into_inner()).await?;
    Ok(response::ok(booking))
}

/// PATCH /bookings/{id} (admin, lead-guide)
#[patch("/{id}")]
pub async fn update_booking(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateBookingRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&BOOKING_MANAGERS)?;

    let booking = BookingService::update(&state.db, path.into_inner(), body.into_inner()).await?;
    Ok(response::ok(booking))
}

/// DELETE /bookings/{id} (admin, lead-guide)
#[delete("/{id}")]
pub async fn delete_booking(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&BOOKING_MANAGERS)?;

    BookingService::delete(&state.db, path.into_inner()).await?;
    Ok(response::no_content())
}

pub fn bookings_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .service(get_checkout_session)
            .service(get_all_bookings)
            .service(create_booking)
            .service(get_booking)
            .service(update_booking)
            .service(delete_booking),
    );
}

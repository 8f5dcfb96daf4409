// ============================================================================
// PAGES HTML (Tera)
// ============================================================================
//
// Toutes les pages reçoivent `user` (si connecté via le cookie) et `alert`
// (si ?alert=booking). Les erreurs sont rendues avec error.html.
//
// ============================================================================

use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use serde::Deserialize;
use tera::Context;
use validator::Validate;

use crate::error::{AppError, PageError};
use crate::middleware::{OptionalUser, PageUser};
use crate::models::dto::UserDataForm;
use crate::models::{tour, users};
use crate::services::booking_service::BookingService;
use crate::services::tour_service::TourService;
use crate::services::user_service::UserService;
use crate::state::AppState;
use crate::templates;

const BOOKING_ALERT: &str = "Your booking was successful! Please check your email for a confirmation. If your booking doesn't show up here immediately, please come back later.";

#[derive(Debug, Default, Deserialize)]
struct AlertQuery {
    alert: Option<String>,
}

fn alert_message(req: &HttpRequest) -> Option<&'static str> {
    let query = web::Query::<AlertQuery>::from_query(req.query_string()).ok()?;
    match query.alert.as_deref() {
        Some("booking") => Some(BOOKING_ALERT),
        _ => None,
    }
}

/// Contexte commun à toutes les pages
fn page_context(req: &HttpRequest, title: &str, user: Option<&users::Model>) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    if let Some(user) = user {
        context.insert("user", user);
    }
    if let Some(alert) = alert_message(req) {
        context.insert("alert", alert);
    }
    context
}

fn render(template: &str, context: &Context) -> Result<HttpResponse, PageError> {
    let html = templates::render(template, context)?;
    Ok(HttpResponse::Ok().content_type(ContentType::html()).body(html))
}

/// GET / - tous les tours visibles
#[get("/")]
pub async fn overview(
    req: HttpRequest,
    user: OptionalUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PageError> {
    let tours = tour::Entity::find_visible()
        .all(&state.db)
        .await
        .map_err(AppError::from)?;

    let mut context = page_context(&req, "All Tours", user.0.as_ref());
    context.insert("tours", &tours);
    render("overview.html", &context)
}

/// GET /tour/{slug} - détail avec guides et reviews
#[get("/tour/{slug}")]
pub async fn tour_page(
    req: HttpRequest,
    user: OptionalUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PageError> {
    let tour = TourService::find_by_slug(&state.db, &path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("There is no tour with that name."))?;

    let title = format!("{} tour", tour.tour.name);
    let mut context = page_context(&req, &title, user.0.as_ref());
    context.insert("tour", &tour);
    render("tour.html", &context)
}

#[get("/login")]
pub async fn login_form(req: HttpRequest, user: OptionalUser) -> Result<HttpResponse, PageError> {
    let context = page_context(&req, "Log into your account", user.0.as_ref());
    render("login.html", &context)
}

#[get("/me")]
pub async fn account(req: HttpRequest, page_user: PageUser) -> Result<HttpResponse, PageError> {
    let context = page_context(&req, "Your account", Some(&page_user.user));
    render("account.html", &context)
}

/// GET /my-tours - tours réservés par l'utilisateur connecté
#[get("/my-tours")]
pub async fn my_tours(
    req: HttpRequest,
    page_user: PageUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PageError> {
    let tours = BookingService::tours_booked_by(&state.db, page_user.user.id).await?;

    let mut context = page_context(&req, "My Tours", Some(&page_user.user));
    context.insert("tours", &tours);
    render("overview.html", &context)
}

/// POST /submit-user-data - formulaire du compte sans JavaScript
#[post("/submit-user-data")]
pub async fn submit_user_data(
    req: HttpRequest,
    page_user: PageUser,
    form: web::Form<UserDataForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PageError> {
    form.validate().map_err(AppError::from)?;
    let form = form.into_inner();

    let user =
        UserService::update_profile(&state.db, page_user.user, Some(form.name), Some(form.email), None)
            .await?;

    let context = page_context(&req, "Your account", Some(&user));
    render("account.html", &context)
}

pub fn views_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(overview)
        .service(tour_page)
        .service(login_form)
        .service(account)
        .service(my_tours)
        .service(submit_user_data);
}

use actix_multipart::form::MultipartForm;
use actix_web::{Either, HttpResponse, delete, get, patch, post, web};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{CreateReviewRequest, CreateTourRequest, TourImagesForm, UpdateTourRequest};
use crate::models::users::Role;
use crate::routes::query_params;
use crate::services::review_service::ReviewService;
use crate::services::tour_service::TourService;
use crate::state::AppState;
use crate::utils::geo::{self, Unit};
use crate::utils::{images, response};

const MAX_TOUR_IMAGES: usize = 3;
const TOUR_MANAGERS: [Role; 2] = [Role::Admin, Role::LeadGuide];

/// GET /tours - Liste filtrable / triable / paginée (PUBLIC)
#[get("")]
pub async fn get_all_tours(
    query: web::Query<Vec<(String, String)>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (tours, projection) = TourService::list(&state.db, query_params(query)).await?;
    response::list(tours, &projection)
}

/// GET /tours/top-5-cheap - Alias : 5 meilleurs tours, moins chers d'abord
#[get("/top-5-cheap")]
pub async fn top_five_cheap(
    query: web::Query<Vec<(String, String)>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let params = query_params(query).with_overrides(
        "-ratingsAverage,price",
        5,
        "name,price,ratingsAverage,summary,difficulty",
    );

    let (tours, projection) = TourService::list(&state.db, params).await?;
    response::list(tours, &projection)
}

/// GET /tours/tour-stats - Statistiques par difficulté (PUBLIC)
#[get("/tour-stats")]
pub async fn get_tour_stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let stats = TourService::tour_stats(&state.db).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "stats": stats },
    })))
}

/// GET /tours/monthly-plan/{year} (admin, lead-guide, guide)
#[get("/monthly-plan/{year}")]
pub async fn get_monthly_plan(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::Admin, Role::LeadGuide, Role::Guide])?;

    let plan = TourService::monthly_plan(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "plan": plan },
    })))
}

/// GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit}
#[get("/tours-within/{distance}/center/{latlng}/unit/{unit}")]
pub async fn get_tours_within(
    path: web::Path<(f64, String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (distance, latlng, unit) = path.into_inner();
    let center = geo::parse_lat_lng(&latlng)?;

    let tours = TourService::tours_within(&state.db, distance, center, Unit::parse(&unit)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": tours.len(),
        "data": { "data": tours },
    })))
}

/// GET /tours/distances/{latlng}/unit/{unit}
#[get("/distances/{latlng}/unit/{unit}")]
pub async fn get_distances(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (latlng, unit) = path.into_inner();
    let center = geo::parse_lat_lng(&latlng)?;

    let distances = TourService::distances(&state.db, center, Unit::parse(&unit)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "data": distances },
    })))
}

/// GET /tours/{id} - Avec guides et reviews (PUBLIC)
#[get("/{id}")]
pub async fn get_tour(path: web::Path<i32>, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let tour = TourService::find(&state.db, path.into_inner()).await?;
    Ok(response::ok(tour))
}

/// POST /tours (admin, lead-guide)
#[post("")]
pub async fn create_tour(
    auth_user: AuthUser,
    body: web::Json<CreateTourRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&TOUR_MANAGERS)?;
    body.validate()?;

    let tour = TourService::create(&state.db, body.into_inner()).await?;
    Ok(response::created(tour))
}

/// Redimensionne imageCover + images et retourne les champs à mettre à jour
async fn save_tour_images(
    state: &AppState,
    tour_id: i32,
    form: TourImagesForm,
) -> Result<UpdateTourRequest, AppError> {
    if form.images.len() > MAX_TOUR_IMAGES {
        return Err(AppError::bad_request(format!(
            "Too many images: a tour can have at most {} images",
            MAX_TOUR_IMAGES
        )));
    }

    let dir = images::tours_dir(&state.config.public_dir);
    let now = Utc::now();
    let mut update = UpdateTourRequest::default();

    // 1. Image de couverture
    if let Some(cover) = form.image_cover.filter(|c| !c.data.is_empty()) {
        images::ensure_image(cover.content_type.as_ref())?;
        let name = images::tour_cover_name(tour_id, now);
        images::resize_and_save(cover.data.to_vec(), images::TOUR_IMAGE_SIZE, dir.join(&name)).await?;
        update.image_cover = Some(name);
    }

    // 2. Galerie (les noms commencent à 1)
    let mut names = Vec::new();
    for (index, image) in form.images.into_iter().filter(|i| !i.data.is_empty()).enumerate() {
        images::ensure_image(image.content_type.as_ref())?;
        let name = images::tour_image_name(tour_id, now, index + 1);
        images::resize_and_save(image.data.to_vec(), images::TOUR_IMAGE_SIZE, dir.join(&name)).await?;
        names.push(name);
    }
    if !names.is_empty() {
        update.images = Some(names);
    }

    Ok(update)
}

/// PATCH /tours/{id} (admin, lead-guide) - JSON ou multipart imageCover/images
#[patch("/{id}")]
pub async fn update_tour(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: Either<web::Json<UpdateTourRequest>, MultipartForm<TourImagesForm>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&TOUR_MANAGERS)?;
    let id = path.into_inner();

    let request = match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => {
            // Le tour doit exister avant d'écrire des fichiers
            TourService::find_model(&state.db, id).await?;
            save_tour_images(&state, id, form.into_inner()).await?
        }
    };
    request.validate()?;

    let tour = TourService::update(&state.db, id, request).await?;
    Ok(response::ok(tour))
}

/// DELETE /tours/{id} (admin, lead-guide)
#[delete("/{id}")]
pub async fn delete_tour(
    auth_user: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&TOUR_MANAGERS)?;

    TourService::delete(&state.db, path.into_inner()).await?;
    Ok(response::no_content())
}

/// GET /tours/{tour_id}/reviews (PROTÉGÉE)
#[get("/{tour_id}/reviews")]
pub async fn get_tour_reviews(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    query: web::Query<Vec<(String, String)>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (reviews, projection) =
        ReviewService::list(&state.db, Some(path.into_inner()), query_params(query)).await?;
    response::list(reviews, &projection)
}

/// POST /tours/{tour_id}/reviews (user)
#[post("/{tour_id}/reviews")]
pub async fn create_tour_review(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<CreateReviewRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth_user.restrict_to(&[Role::User])?;
    body.validate()?;

    let review =
        ReviewService::create(&state.db, &auth_user.user, Some(path.into_inner()), body.into_inner()).await?;
    Ok(response::created(review))
}

pub fn tours_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tours")
            // Alias et agrégations avant "/{id}"
            .service(top_five_cheap)
            .service(get_tour_stats)
            .service(get_monthly_plan)
            .service(get_tours_within)
            .service(get_distances)
            // Reviews imbriquées
            .service(get_tour_reviews)
            .service(create_tour_review)
            // CRUD
            .service(get_all_tours)
            .service(create_tour)
            .service(get_tour)
            .service(update_tour)
            .service(delete_tour),
    );
}

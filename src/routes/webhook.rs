use actix_web::{HttpRequest, HttpResponse, post, web};
use serde_json::json;
use tracing::debug;

use crate::error::AppError;
use crate::services::booking_service::BookingService;
use crate::services::payment::WebhookEvent;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /webhook-checkout - Corps brut : la signature porte sur les octets reçus
#[post("/webhook-checkout")]
pub async fn webhook_checkout(
    req: HttpRequest,
    payload: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    // 1. Vérifier la signature
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::bad_request("Webhook error: missing Stripe-Signature header"))?;
    let event = state.payments.construct_event(&payload, signature)?;

    // 2. Créer la réservation sur paiement confirmé
    match event {
        WebhookEvent::CheckoutCompleted(checkout) => {
            BookingService::create_from_checkout(&state.db, &checkout).await?;
        }
        WebhookEvent::Other(kind) => debug!(event = %kind, "Ignoring webhook event"),
    }

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TEST_SIGNATURE, empty_db, sample_booking, sample_user, test_state_with};
    use crate::routes::configure_routes;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::Value;

    const COMPLETED: &str = r#"{"type":"checkout.session.completed","data":{"object":{"client_reference_id":"3","customer_email":"laura@example.com","amount_total":39700}}}"#;

    #[actix_web::test]
    async fn test_completed_checkout_creates_booking() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user()]])
            .append_query_results([vec![sample_booking(1, 3, 1)]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(db)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook-checkout")
            .insert_header(("Stripe-Signature", TEST_SIGNATURE))
            .insert_header(("Content-Type", "application/json"))
            .set_payload(COMPLETED)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({ "received": true }));
    }

    #[actix_web::test]
    async fn test_bad_signature_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(empty_db())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook-checkout")
            .insert_header(("Stripe-Signature", "t=-9223372036854775808,v1=00"))
            .set_payload(COMPLETED)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().starts_with("Webhook error:"));
    }

    #[actix_web::test]
    async fn test_missing_signature_header() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(empty_db())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook-checkout")
            .set_payload(COMPLETED)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_other_events_are_acknowledged() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state_with(empty_db())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook-checkout")
            .insert_header(("Stripe-Signature", TEST_SIGNATURE))
            .set_payload(r#"{"type":"payment_intent.created","data":{"object":{}}}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

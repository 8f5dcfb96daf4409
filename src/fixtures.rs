// Modèles d'exemple partagés par les tests

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use std::sync::{Arc, Mutex};

use crate::config::{Config, EmailConfig, Environment};
use crate::error::AppError;
use crate::models::tour::{DateList, Difficulty, GeoPoint, Locations, StringList};
use crate::models::users::Role;
use crate::models::{booking, review, tour, users};
use crate::services::email::{Mailer, OutgoingEmail};
use crate::services::payment::{
    CheckoutRequest, CheckoutSession, CompletedCheckout, PaymentGateway, WebhookEvent,
};
use crate::state::AppState;
use crate::templates;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_SIGNATURE: &str = "t=1700000000,v1=test";

pub fn load_templates() {
    templates::init(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")).unwrap();
}

pub fn test_config() -> Config {
    Config {
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://localhost/natours_test".to_string(),
        jwt_secret: "my-ultra-secure-and-ultra-long-secret".to_string(),
        jwt_expires_in: Duration::days(90),
        jwt_cookie_expires_in_days: 90,
        email: EmailConfig {
            from: "hello@natours.io".to_string(),
            host: "localhost".to_string(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            sendgrid_username: None,
            sendgrid_password: None,
        },
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        templates_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string(),
        public_dir: std::env::temp_dir().display().to_string(),
    }
}

/// Mailer qui garde les emails en mémoire (ou échoue si `failing`)
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failing: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::Mail("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Passerelle de paiement sans réseau ; seule la signature TEST_SIGNATURE est acceptée
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

/// Événement minimal : {"type": ..., "data": {"object": {...}}}
#[derive(Deserialize)]
struct FakeEvent {
    #[serde(rename = "type")]
    kind: String,
    data: FakeEventData,
}

#[derive(Deserialize)]
struct FakeEventData {
    object: serde_json::Value,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: "cs_test_123".to_string(),
            url: Some("https://checkout.stripe.com/c/pay/cs_test_123".to_string()),
        })
    }

    fn construct_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, AppError> {
        if signature != TEST_SIGNATURE {
            return Err(AppError::bad_request(
                "Webhook error: error comparing signatures",
            ));
        }
        let event: FakeEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::bad_request(format!("Webhook error: {}", e)))?;

        if event.kind != "checkout.session.completed" {
            return Ok(WebhookEvent::Other(event.kind));
        }
        let checkout: CompletedCheckout = serde_json::from_value(event.data.object)
            .map_err(|e| AppError::bad_request(format!("Webhook error: {}", e)))?;
        Ok(WebhookEvent::CheckoutCompleted(checkout))
    }
}

pub fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

pub fn test_state() -> AppState {
    test_state_with(empty_db())
}

pub fn test_state_with(db: DatabaseConnection) -> AppState {
    test_state_full(db, RecordingMailer::default())
}

pub fn test_state_full(db: DatabaseConnection, mailer: RecordingMailer) -> AppState {
    AppState {
        db,
        config: test_config(),
        mailer: Arc::new(mailer),
        payments: Arc::new(FakeGateway::default()),
    }
}

pub fn sample_user() -> users::Model {
    users::Model {
        id: 1,
        name: "Laura Wilson".to_string(),
        email: "laura@example.com".to_string(),
        photo: "default.jpg".to_string(),
        role: Role::User,
        password: "hash".to_string(),
        password_changed_at: None,
        password_reset_token: None,
        password_reset_expires: None,
        active: true,
        created_at: Utc::now(),
    }
}

pub fn sample_user_with(id: i32, name: &str, role: Role) -> users::Model {
    users::Model {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        role,
        ..sample_user()
    }
}

pub fn sample_tour(id: i32, name: &str) -> tour::Model {
    tour::Model {
        id,
        name: name.to_string(),
        slug: slug::slugify(name),
        duration: 5,
        max_group_size: 25,
        difficulty: Difficulty::Easy,
        ratings_average: 4.5,
        ratings_quantity: 0,
        price: Decimal::new(397, 0),
        price_discount: None,
        summary: "Breathtaking hike through the Canadian Banff National Park".to_string(),
        description: None,
        image_cover: format!("tour-{}-cover.jpg", id),
        images: StringList(vec![format!("tour-{}-1.jpg", id)]),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        start_dates: DateList(vec![
            Utc.with_ymd_and_hms(2025, 4, 25, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 7, 20, 10, 0, 0).unwrap(),
        ]),
        secret_tour: false,
        start_location: Some(GeoPoint {
            kind: "Point".to_string(),
            coordinates: vec![-115.570154, 51.178456],
            address: Some("224 Banff Ave, Banff, AB, Canada".to_string()),
            description: Some("Banff, CAN".to_string()),
            day: None,
        }),
        locations: Locations(vec![GeoPoint {
            kind: "Point".to_string(),
            coordinates: vec![-116.214531, 51.417611],
            address: None,
            description: Some("Banff National Park".to_string()),
            day: Some(1),
        }]),
    }
}

pub fn sample_review(id: i32, tour_id: i32, user_id: i32, rating: i32) -> review::Model {
    review::Model {
        id,
        review: "Amazing tour, would book again!".to_string(),
        rating,
        created_at: Utc::now(),
        tour_id,
        user_id,
    }
}

pub fn sample_booking(id: i32, tour_id: i32, user_id: i32) -> booking::Model {
    booking::Model {
        id,
        tour_id,
        user_id,
        price: Decimal::new(397, 0),
        created_at: Utc::now(),
        paid: true,
    }
}

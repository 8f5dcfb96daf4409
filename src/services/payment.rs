// ============================================================================
// SERVICE : PAIEMENT (Stripe Checkout)
// ============================================================================
//
// Workflow:
//   1. GET /bookings/checkout-session/{tourId} crée une session hébergée
//      (client_reference_id = id du tour, customer_email = email du user)
//   2. Le client paie sur la page Stripe
//   3. Stripe appelle POST /webhook-checkout avec l'événement signé
//   4. construct_event vérifie la signature puis BookingService crée la réservation
//
// L'appel API et la vérification du header Stripe-Signature passent par
// async-stripe.
//
// ============================================================================

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSessionMode, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, Currency, EventObject, EventType, Webhook,
};
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub tour_id: i32,
    pub tour_name: String,
    pub summary: String,
    pub image_url: String,
    pub price: Decimal,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Objet "checkout.session" reçu par le webhook
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletedCheckout {
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount_total: Option<i64>,
}

impl CompletedCheckout {
    /// Montant en centimes -> prix
    pub fn price(&self) -> Option<Decimal> {
        self.amount_total.map(|cents| Decimal::new(cents, 2))
    }
}

impl From<stripe::CheckoutSession> for CompletedCheckout {
    fn from(session: stripe::CheckoutSession) -> Self {
        // Stripe ne renvoie customer_email que s'il a été fourni à la création
        let customer_email = session
            .customer_email
            .or_else(|| session.customer_details.and_then(|details| details.email));

        Self {
            client_reference_id: session.client_reference_id,
            customer_email,
            amount_total: session.amount_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted(CompletedCheckout),
    Other(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError>;

    fn construct_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, AppError>;
}

pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(secret_key.into()),
            webhook_secret: webhook_secret.into(),
        }
    }
}

fn webhook_error(reason: impl std::fmt::Display) -> AppError {
    AppError::bad_request(format!("Webhook error: {}", reason))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError> {
        let unit_amount = unit_amount(request.price)?;
        let client_reference_id = request.tour_id.to_string();

        let mut params = CreateCheckoutSession::new();
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(request.success_url.as_str());
        params.cancel_url = Some(request.cancel_url.as_str());
        params.customer_email = Some(request.customer_email.as_str());
        params.client_reference_id = Some(client_reference_id.as_str());
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: format!("{} Tour", request.tour_name),
                    description: Some(request.summary.clone()),
                    images: Some(vec![request.image_url.clone()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = stripe::CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| {
                warn!(tour_id = request.tour_id, "Checkout session creation failed: {}", e);
                AppError::Payment(e.to_string())
            })?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    fn construct_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, AppError> {
        let payload = std::str::from_utf8(payload).map_err(webhook_error)?;
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret)
            .map_err(webhook_error)?;

        debug!(event = ?event.type_, "Webhook event received");
        match (event.type_, event.data.object) {
            (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session)) => {
                Ok(WebhookEvent::CheckoutCompleted(session.into()))
            }
            (kind, _) => Ok(WebhookEvent::Other(kind.to_string())),
        }
    }
}

/// Prix -> montant Stripe en centimes
pub fn unit_amount(price: Decimal) -> Result<i64, AppError> {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.round().to_i64())
        .ok_or_else(|| AppError::Payment(format!("Invalid price {}", price)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn assert_webhook_error(err: AppError) {
        let error = err.translate();
        assert_eq!(error.status.as_u16(), 400);
        assert!(error.message.starts_with("Webhook error: "));
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        let gateway = StripeGateway::new("sk_test", SECRET);
        let payload = r#"{"type":"checkout.session.completed"}"#;

        assert_webhook_error(gateway.construct_event(payload.as_bytes(), "t=1,v1=00").unwrap_err());

        let signature = sign(payload, "whsec_wrong", Utc::now().timestamp());
        assert_webhook_error(gateway.construct_event(payload.as_bytes(), &signature).unwrap_err());
    }

    #[test]
    fn test_extreme_timestamp_is_rejected() {
        let gateway = StripeGateway::new("sk_test", SECRET);

        let err = gateway
            .construct_event(b"{}", "t=-9223372036854775808,v1=00")
            .unwrap_err();
        assert_webhook_error(err);
    }

    #[test]
    fn test_old_signature_is_rejected() {
        let gateway = StripeGateway::new("sk_test", SECRET);
        let payload = r#"{"type":"checkout.session.completed"}"#;
        let signature = sign(payload, SECRET, Utc::now().timestamp() - 3600);

        assert_webhook_error(gateway.construct_event(payload.as_bytes(), &signature).unwrap_err());
    }

    #[test]
    fn test_signed_but_malformed_payload() {
        let gateway = StripeGateway::new("sk_test", SECRET);
        let payload = r#"{"type":"checkout.session.completed"}"#;
        let signature = sign(payload, SECRET, Utc::now().timestamp());

        assert_webhook_error(gateway.construct_event(payload.as_bytes(), &signature).unwrap_err());
    }

    #[test]
    fn test_non_utf8_payload() {
        let gateway = StripeGateway::new("sk_test", SECRET);
        assert_webhook_error(gateway.construct_event(&[0xff, 0xfe], "t=1,v1=00").unwrap_err());
    }

    #[test]
    fn test_unit_amount() {
        assert_eq!(unit_amount(Decimal::new(49750, 2)).unwrap(), 49750);
        assert_eq!(unit_amount(Decimal::new(397, 0)).unwrap(), 39700);
        assert_eq!(unit_amount(Decimal::new(19999, 3)).unwrap(), 2000);
    }

    #[test]
    fn test_unit_amount_overflow() {
        let err = unit_amount(Decimal::MAX).unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
    }

    #[test]
    fn test_completed_checkout_price() {
        let checkout = CompletedCheckout {
            client_reference_id: Some("3".to_string()),
            customer_email: Some("laura@example.com".to_string()),
            amount_total: Some(99700),
        };
        assert_eq!(checkout.price(), Some(Decimal::new(997, 0)));
    }
}

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::services::email::Mailer;
use crate::services::payment::PaymentGateway;

/// État partagé par tous les workers actix (via web::Data)
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
}

mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
mod templates;
mod utils;

#[cfg(test)]
mod fixtures;

use actix_files::Files;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::services::email::SmtpMailer;
use crate::services::payment::StripeGateway;
use crate::state::AppState;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self' https://js.stripe.com https://api.mapbox.com; \
    frame-src https://js.stripe.com; \
    connect-src 'self' https://api.mapbox.com https://events.mapbox.com; \
    img-src 'self' data: blob:; \
    style-src 'self' 'unsafe-inline' https://api.mapbox.com";

fn io_error(message: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(message.to_string())
}

/// Panics non rattrapées : loggées via tracing avant le hook par défaut
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("💥 UNCAUGHT PANIC! Shutting down... {}", panic_info);
        default_hook(panic_info);
    }));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    install_panic_hook();

    let config = Config::from_env().map_err(|e| {
        error!("❌ Invalid configuration: {}", e);
        io_error(e)
    })?;
    config::set_environment(config.environment);

    info!("🔌 Connecting to database...");
    let db = db::establish_connection(&config).await.map_err(|e| {
        error!("❌ Failed to connect to database: {}", e);
        io_error(e)
    })?;
    db::sync_schema(&db).await.map_err(io_error)?;
    info!("✅ Database connected!");

    templates::init(&config.templates_dir).map_err(io_error)?;
    let mailer = SmtpMailer::from_config(&config).map_err(io_error)?;
    let payments = StripeGateway::new(&config.stripe_secret_key, &config.stripe_webhook_secret);

    let state = web::Data::new(AppState {
        db,
        config: config.clone(),
        mailer: Arc::new(mailer),
        payments: Arc::new(payments),
    });

    info!(
        "🚀 Starting server on http://{}:{} ({})",
        config.host,
        config.port,
        config.environment.as_str()
    );

    let public_dir = config.public_dir.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("Content-Security-Policy", CONTENT_SECURITY_POLICY))
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "SAMEORIGIN"))
                    .add(("Referrer-Policy", "no-referrer")),
            )
            .app_data(state.clone())
            .configure(routes::configure_routes)
            .service(Files::new("/css", format!("{}/css", public_dir)))
            .service(Files::new("/js", format!("{}/js", public_dir)))
            .service(Files::new("/img", format!("{}/img", public_dir)))
            .default_service(web::route().to(routes::not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .shutdown_timeout(30)
    .run()
    .await?;

    info!("👋 Server stopped");
    Ok(())
}

use std::sync::OnceLock;

use tera::{Context, Tera};
use tracing::{info, warn};

use crate::error::AppError;

static TEMPLATES: OnceLock<Tera> = OnceLock::new();

/// Charge tous les templates du dossier (pages + emails) une seule fois
pub fn init(dir: &str) -> Result<(), tera::Error> {
    if TEMPLATES.get().is_some() {
        return Ok(());
    }

    let tera = Tera::new(&format!("{}/**/*", dir.trim_end_matches('/')))?;
    info!("Loaded {} templates from {}", tera.get_template_names().count(), dir);

    if TEMPLATES.set(tera).is_err() {
        warn!("Templates were initialised concurrently, keeping the first set");
    }
    Ok(())
}

pub fn render(name: &str, context: &Context) -> Result<String, AppError> {
    let tera = TEMPLATES
        .get()
        .ok_or_else(|| AppError::Internal("Templates are not loaded".to_string()))?;

    Ok(tera.render(name, context)?)
}

// connexion BD + création des tables au démarrage

use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::models::{booking, review, tour, tour_guide, users};

pub async fn establish_connection(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(10)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(options).await
}

fn table_for<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    statement
}

/// Une review par utilisateur et par tour
fn unique_review_index() -> IndexCreateStatement {
    Index::create()
        .name("idx_reviews_tour_user")
        .table(review::Entity)
        .col(review::Column::TourId)
        .col(review::Column::UserId)
        .unique()
        .if_not_exists()
        .to_owned()
}

/// Tables créées dans l'ordre des clés étrangères (users et tours d'abord)
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        table_for(&schema, users::Entity),
        table_for(&schema, tour::Entity),
        table_for(&schema, tour_guide::Entity),
        table_for(&schema, review::Entity),
        table_for(&schema, booking::Entity),
    ];
    for table in &tables {
        db.execute(backend.build(table)).await?;
    }
    db.execute(backend.build(&unique_review_index())).await?;

    info!("🗄️  Schema ready ({} tables)", tables.len());
    Ok(())
}

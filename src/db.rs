use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new(database_url);
    opts.connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    tracing::info!(
        "Connecting to database: {}",
        if database_url.starts_with("postgres") {
            "PostgreSQL"
        } else {
            "SQLite (local)"
        }
    );
    Database::connect(opts).await
}

/// Applies pending schema migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}

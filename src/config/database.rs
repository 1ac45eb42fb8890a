//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated with `Schema::create_table_from_entity`, so the schema always
//! matches the entity definitions without hand-written SQL.

use crate::entities::{
    Business, EnergyLedger, EnergyPool, IntegrationConnection, MissionActivation, SystemState,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/mission_energy.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables (if missing) from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Pools before the ledger, which references them.
    let mut business_table = schema.create_table_from_entity(Business);
    let mut pool_table = schema.create_table_from_entity(EnergyPool);
    let mut ledger_table = schema.create_table_from_entity(EnergyLedger);
    let mut activation_table = schema.create_table_from_entity(MissionActivation);
    let mut connection_table = schema.create_table_from_entity(IntegrationConnection);
    let mut system_state_table = schema.create_table_from_entity(SystemState);

    for table in [
        business_table.if_not_exists(),
        pool_table.if_not_exists(),
        ledger_table.if_not_exists(),
        activation_table.if_not_exists(),
        connection_table.if_not_exists(),
        system_state_table.if_not_exists(),
    ] {
        db.execute(builder.build(&*table)).await?;
    }

    info!("Database tables ensured");
    Ok(())
}

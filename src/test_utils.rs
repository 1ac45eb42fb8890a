//! Shared test utilities.
//!
//! This module provides helpers for setting up an in-memory or file-backed
//! database, the energy pool manager and the activation gate with sensible defaults.

use crate::{
    config::{catalog::MissionCatalog, energy::EnergyTables},
    core::{
        activation::{MissionActivationGate, activation_id},
        business, connections,
        cycle::CycleWindow,
        energy::EnergyPoolManager,
    },
    entities::{self, EnergyPool, MissionActivation, energy_pool, mission_activation},
    errors::Result,
    models::{ConnectionOwner, ConnectionType, SubscriptionTier},
};
use chrono::{TimeDelta, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set, sea_query::Expr,
};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// A single connection is used: every `sqlite::memory:` connection is its own
/// database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in a temporary directory with several
/// connections, so concurrent transactions really contend for the write lock.
///
/// The directory is removed when the returned [`tempfile::TempDir`] is dropped.
pub async fn setup_file_db(max_connections: u32) -> Result<(tempfile::TempDir, DatabaseConnection)> {
    init_test_tracing();
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("energy.db").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(max_connections).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((dir, db))
}

/// Sets up a database and a pool manager using the default tables.
pub async fn setup_pools() -> Result<(DatabaseConnection, EnergyPoolManager)> {
    setup_pools_with(EnergyTables::default()).await
}

/// Sets up a database and a pool manager using custom tables.
pub async fn setup_pools_with(
    tables: EnergyTables,
) -> Result<(DatabaseConnection, EnergyPoolManager)> {
    let db = setup_test_db().await?;
    let pools = EnergyPoolManager::new(db.clone(), Arc::new(tables));
    Ok((db, pools))
}

/// Sets up a database and an activation gate with the default tables and catalog.
pub async fn setup_gate() -> Result<(DatabaseConnection, MissionActivationGate)> {
    let (db, pools) = setup_pools().await?;
    let gate = MissionActivationGate::new(pools, Arc::new(MissionCatalog::default()));
    Ok((db, gate))
}

/// Creates a test business named after its id.
pub async fn create_test_business(
    db: &DatabaseConnection,
    id: &str,
    tier: SubscriptionTier,
) -> Result<entities::BusinessModel> {
    business::create_business(db, id, &format!("Test Business {id}"), tier).await
}

/// Sets a connection flag for a business or user.
pub async fn connect(
    db: &DatabaseConnection,
    owner: ConnectionOwner,
    owner_id: &str,
    kind: ConnectionType,
    connected: bool,
) -> Result<()> {
    connections::set_connection(db, owner, owner_id, kind, connected).await
}

/// Moves a pool's cycle `months_ago` months into the past without touching its balance.
pub async fn backdate_pool(db: &DatabaseConnection, business_id: &str, months_ago: i64) -> Result<()> {
    let cycle = CycleWindow::containing(Utc::now() - TimeDelta::days(31 * months_ago))?;
    EnergyPool::update_many()
        .col_expr(energy_pool::Column::CycleStart, Expr::value(cycle.start))
        .col_expr(energy_pool::Column::CycleEnd, Expr::value(cycle.end))
        .filter(energy_pool::Column::BusinessId.eq(business_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Inserts a pool whose stored tier cannot be parsed, so resetting it fails.
pub async fn insert_corrupt_pool(db: &DatabaseConnection, business_id: &str) -> Result<()> {
    let now = Utc::now();
    let cycle = CycleWindow::containing(now)?;
    energy_pool::ActiveModel {
        business_id: Set(business_id.to_string()),
        subscription_tier: Set("DIAMOND".to_string()),
        monthly_limit: Set(100),
        used: Set(0),
        remaining: Set(100),
        cycle_start: Set(cycle.start),
        cycle_end: Set(cycle.end),
        last_reset: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Moves an activation's expiry into the past, bypassing config validation.
pub async fn expire_activation(
    db: &DatabaseConnection,
    business_id: &str,
    mission_id: &str,
) -> Result<()> {
    MissionActivation::update_many()
        .col_expr(
            mission_activation::Column::ExpiresAt,
            Expr::value(Some(Utc::now() - TimeDelta::minutes(1))),
        )
        .filter(mission_activation::Column::Id.eq(activation_id(business_id, mission_id)))
        .exec(db)
        .await?;
    Ok(())
}

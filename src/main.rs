//! `energy-reset` - one-shot monthly energy reset job.
//!
//! Meant to run from a scheduler shortly after midnight UTC on the first of each
//! month. Running it again later in the same month does nothing.

use chrono::Utc;
use dotenvy::dotenv;
use mission_energy::{
    config::{self, database},
    core::energy::EnergyPoolManager,
    errors::Result,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load and validate energy tables and catalog
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    // 5. Sweep
    let pools = EnergyPoolManager::new(db, Arc::new(app_config.energy));
    match pools.reset_all_if_due(Utc::now()).await? {
        Some(summary) if summary.failed_count > 0 => warn!(
            "Energy reset completed with failures: {} reset, {} failed ({})",
            summary.success_count,
            summary.failed_count,
            summary.failed_business_ids.join(", ")
        ),
        Some(summary) => info!("Energy reset completed: {} pools reset", summary.success_count),
        None => info!("Energy pools already reset this month, nothing to do"),
    }

    Ok(())
}

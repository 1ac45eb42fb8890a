//! Business accounts as seen by the activation gate: existence, tier and suspension.

use crate::{
    core::energy::{EnergyPool, EnergyPoolManager},
    entities::{Business, business},
    errors::{Error, Result},
    models::SubscriptionTier,
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// Creates a business account.
pub async fn create_business<C>(
    db: &C,
    id: &str,
    name: &str,
    tier: SubscriptionTier,
) -> Result<business::Model>
where
    C: ConnectionTrait,
{
    let model = business::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        subscription_tier: Set(tier.as_str().to_string()),
        is_suspended: Set(false),
        created_at: Set(Utc::now()),
    };
    let saved = model.insert(db).await?;
    info!("Created business {id} ({tier})");
    Ok(saved)
}

/// Looks up a business, failing with [`Error::BusinessNotFound`] if it does not exist.
pub async fn get_business<C>(db: &C, id: &str) -> Result<business::Model>
where
    C: ConnectionTrait,
{
    Business::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::BusinessNotFound {
            business_id: id.to_string(),
        })
}

/// The stored subscription tier of a business.
pub fn tier_of(model: &business::Model) -> Result<SubscriptionTier> {
    model.subscription_tier.parse()
}

/// Suspends or reinstates a business.
pub async fn set_suspended(db: &DatabaseConnection, id: &str, suspended: bool) -> Result<()> {
    let existing = get_business(db, id).await?;
    let mut active_model: business::ActiveModel = existing.into();
    active_model.is_suspended = Set(suspended);
    active_model.update(db).await?;
    info!("Business {id} suspended: {suspended}");
    Ok(())
}

/// Changes a business's subscription tier and moves its energy pool with it.
///
/// Both rows change in one transaction. Usage this cycle is kept, so the pool
/// ends at `max(0, new_limit - used)`; a business without a pool gets a fresh one.
pub async fn set_tier(
    pools: &EnergyPoolManager,
    id: &str,
    tier: SubscriptionTier,
) -> Result<EnergyPool> {
    let txn = pools.db.begin().await?;

    let result = Business::update_many()
        .col_expr(
            business::Column::SubscriptionTier,
            Expr::value(tier.as_str()),
        )
        .filter(business::Column::Id.eq(id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::BusinessNotFound {
            business_id: id.to_string(),
        });
    }

    let pool = pools.update_tier_in(&txn, id, tier).await?;
    txn.commit().await?;

    info!("Business {id} changed tier to {tier}");
    Ok(pool)
}

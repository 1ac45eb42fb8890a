//! Energy pool business logic - the monthly per-business activation budget.
//!
//! Every mutation of a pool is a single conditional `UPDATE`, so concurrent
//! activations for the same business cannot both spend the last of a budget.
//! Consumption and refunds also append to the energy ledger inside the same
//! database transaction.

use crate::{
    config::energy::EnergyTables,
    core::cycle::CycleWindow,
    entities::{EnergyLedger, EnergyPool as EnergyPoolEntity, energy_ledger, energy_pool},
    errors::{EnergyShortfall, Error, MissionAlternative, Result},
    models::{MissionType, SubscriptionTier},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, QueryOrder, Set, TransactionTrait, Value,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Maximum number of cheaper mission types suggested on an insufficient-energy failure.
pub const MAX_ALTERNATIVES: usize = 3;

/// Validated view of an energy pool row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyPool {
    /// Owning business
    pub business_id: String,
    /// Subscription tier the limit was derived from
    pub tier: SubscriptionTier,
    /// Energy granted per cycle
    pub monthly_limit: i64,
    /// Energy spent this cycle
    pub used: i64,
    /// Energy still available this cycle
    pub remaining: i64,
    /// Month the usage accumulates over
    pub cycle: CycleWindow,
    /// When a reset was last applied
    pub last_reset: DateTime<Utc>,
}

impl TryFrom<energy_pool::Model> for EnergyPool {
    type Error = Error;

    fn try_from(model: energy_pool::Model) -> Result<Self> {
        let tier: SubscriptionTier = model.subscription_tier.parse()?;

        if model.used < 0 || model.remaining < 0 {
            return Err(Error::Config {
                message: format!(
                    "Energy pool for {} has negative balance (used {}, remaining {})",
                    model.business_id, model.used, model.remaining
                ),
            });
        }

        // Usage can exceed the limit after a downgrade or on PLATINUM; remaining floors at zero.
        if model.remaining != (model.monthly_limit - model.used).max(0) {
            return Err(Error::Config {
                message: format!(
                    "Energy pool for {} is inconsistent: used {}, remaining {}, limit {}",
                    model.business_id, model.used, model.remaining, model.monthly_limit
                ),
            });
        }

        Ok(Self {
            business_id: model.business_id,
            tier,
            monthly_limit: model.monthly_limit,
            used: model.used,
            remaining: model.remaining,
            cycle: CycleWindow {
                start: model.cycle_start,
                end: model.cycle_end,
            },
            last_reset: model.last_reset,
        })
    }
}

impl EnergyPool {
    /// Whether the cycle ended and the pool is waiting for the monthly reset.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.cycle.is_expired(now)
    }

    /// Share of the monthly limit used, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_percent(&self) -> f64 {
        if self.monthly_limit <= 0 {
            return 0.0;
        }
        self.used as f64 / self.monthly_limit as f64 * 100.0
    }
}

/// Result of a read-only affordability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// The pool can pay for the mission
    Available {
        /// Energy the mission costs
        cost: i64,
        /// Balance after paying (PLATINUM floors at zero)
        remaining_after: i64,
    },
    /// The pool cannot pay; carries the shortfall and cheaper options
    Insufficient(EnergyShortfall),
}

impl Availability {
    /// Whether the mission can be paid for.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Net energy usage for the current cycle, for dashboards and analytics.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSummary {
    /// The pool the summary was computed for
    pub pool: EnergyPool,
    /// Share of the limit used, in percent
    pub usage_percent: f64,
    /// Consumed minus refunded energy per mission type this cycle
    pub by_mission_type: BTreeMap<MissionType, i64>,
}

/// Owns the energy pools of all businesses.
///
/// Cheap to clone: the database handle and the tables are shared.
#[derive(Debug, Clone)]
pub struct EnergyPoolManager {
    pub(crate) db: DatabaseConnection,
    pub(crate) tables: Arc<EnergyTables>,
}

impl EnergyPoolManager {
    /// Creates a manager over `db` using the given tier limits and mission costs.
    #[must_use]
    pub const fn new(db: DatabaseConnection, tables: Arc<EnergyTables>) -> Self {
        Self { db, tables }
    }

    /// The tables this manager prices missions with.
    #[must_use]
    pub fn tables(&self) -> &EnergyTables {
        &self.tables
    }

    /// Loads and validates a pool row through any connection or transaction.
    pub(crate) async fn find_in<C>(conn: &C, business_id: &str) -> Result<Option<EnergyPool>>
    where
        C: ConnectionTrait,
    {
        EnergyPoolEntity::find_by_id(business_id.to_string())
            .one(conn)
            .await?
            .map(EnergyPool::try_from)
            .transpose()
    }

    async fn require_in<C>(conn: &C, business_id: &str) -> Result<EnergyPool>
    where
        C: ConnectionTrait,
    {
        Self::find_in(conn, business_id)
            .await?
            .ok_or_else(|| Error::EnergyPoolNotInitialized {
                business_id: business_id.to_string(),
            })
    }

    /// Creates a pool with a full budget for the current month, overwriting any
    /// existing pool for the business.
    #[instrument(skip(self))]
    pub async fn initialize(&self, business_id: &str, tier: SubscriptionTier) -> Result<EnergyPool> {
        self.initialize_in(&self.db, business_id, tier, Utc::now())
            .await
    }

    pub(crate) async fn initialize_in<C>(
        &self,
        conn: &C,
        business_id: &str,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> Result<EnergyPool>
    where
        C: ConnectionTrait,
    {
        let (mut model, limit) = self.fresh_model(business_id, tier, now)?;

        let existing = EnergyPoolEntity::find_by_id(business_id.to_string())
            .one(conn)
            .await?;
        if let Some(row) = &existing {
            model.created_at = Set(row.created_at);
        }

        let saved = if existing.is_some() {
            warn!("Overwriting existing energy pool for business {business_id}");
            model.update(conn).await?
        } else {
            model.insert(conn).await?
        };

        info!("Initialized {tier} energy pool for business {business_id} with {limit} energy");
        EnergyPool::try_from(saved)
    }

    /// Returns the existing pool, or initializes one for `tier` if the business has none.
    pub async fn ensure_pool(&self, business_id: &str, tier: SubscriptionTier) -> Result<EnergyPool> {
        self.ensure_pool_in(&self.db, business_id, tier).await
    }

    pub(crate) async fn ensure_pool_in<C>(
        &self,
        conn: &C,
        business_id: &str,
        tier: SubscriptionTier,
    ) -> Result<EnergyPool>
    where
        C: ConnectionTrait,
    {
        let (model, limit) = self.fresh_model(business_id, tier, Utc::now())?;

        // Insert first so a transaction takes the write lock before reading.
        let inserted = EnergyPoolEntity::insert(model)
            .on_conflict(
                OnConflict::column(energy_pool::Column::BusinessId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        if inserted > 0 {
            info!("Initialized {tier} energy pool for business {business_id} with {limit} energy");
        }

        Self::require_in(conn, business_id).await
    }

    /// A full, unused pool row for `tier` in the cycle containing `now`.
    fn fresh_model(
        &self,
        business_id: &str,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> Result<(energy_pool::ActiveModel, i64)> {
        let cycle = CycleWindow::containing(now)?;
        let limit = self.tables.monthly_limit(tier)?;

        let model = energy_pool::ActiveModel {
            business_id: Set(business_id.to_string()),
            subscription_tier: Set(tier.as_str().to_string()),
            monthly_limit: Set(limit),
            used: Set(0),
            remaining: Set(limit),
            cycle_start: Set(cycle.start),
            cycle_end: Set(cycle.end),
            last_reset: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok((model, limit))
    }

    /// Returns the pool for a business.
    ///
    /// Never resets inline: a pool whose cycle ended is returned as-is and reports
    /// [`EnergyPool::is_stale`] until the monthly sweep runs.
    pub async fn get(&self, business_id: &str) -> Result<EnergyPool> {
        let pool = Self::require_in(&self.db, business_id).await?;
        if pool.is_stale(Utc::now()) {
            debug!("Energy pool for {business_id} is stale, waiting for reset");
        }
        Ok(pool)
    }

    /// Energy cost of a mission type.
    pub fn cost_of(&self, mission_type: MissionType) -> Result<i64> {
        self.tables.cost_of(mission_type)
    }

    /// Mission types cheaper than `requested` that fit in `remaining`, closest cost first.
    ///
    /// Ranking favours the most expensive mission that still fits, so the cheapest
    /// missions (check-ins and store visits at 15) only appear once fewer than
    /// three pricier options are affordable. A STARTER pool left with 55 asking for
    /// a 60-cost referral is offered the 45 and 40 cost missions, not the 15-cost ones.
    #[must_use]
    pub fn alternatives(&self, requested: MissionType, remaining: i64) -> Vec<MissionAlternative> {
        let Ok(requested_cost) = self.tables.cost_of(requested) else {
            return Vec::new();
        };

        let mut candidates: Vec<MissionAlternative> = self
            .tables
            .mission_costs
            .iter()
            .filter(|(kind, cost)| **kind != requested && **cost < requested_cost && **cost <= remaining)
            .map(|(kind, cost)| MissionAlternative {
                mission_type: *kind,
                cost: *cost,
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.cost
                .cmp(&a.cost)
                .then_with(|| a.mission_type.cmp(&b.mission_type))
        });
        candidates.truncate(MAX_ALTERNATIVES);
        candidates
    }

    fn shortfall(&self, mission_type: MissionType, required: i64, remaining: i64) -> EnergyShortfall {
        EnergyShortfall {
            mission_type,
            required,
            remaining,
            shortfall: required - remaining,
            alternatives: self.alternatives(mission_type, remaining),
        }
    }

    /// Read-only affordability check. Does not reserve anything; [`Self::consume`]
    /// checks the balance again when it spends.
    pub async fn check_availability(
        &self,
        business_id: &str,
        mission_type: MissionType,
    ) -> Result<Availability> {
        let pool = Self::require_in(&self.db, business_id).await?;
        let cost = self.cost_of(mission_type)?;

        if pool.tier.is_unlimited() {
            return Ok(Availability::Available {
                cost,
                remaining_after: (pool.remaining - cost).max(0),
            });
        }

        if pool.remaining >= cost {
            Ok(Availability::Available {
                cost,
                remaining_after: pool.remaining - cost,
            })
        } else {
            Ok(Availability::Insufficient(self.shortfall(
                mission_type,
                cost,
                pool.remaining,
            )))
        }
    }

    /// Spends the energy for one mission activation and records it in the ledger.
    ///
    /// The balance is re-checked by the `UPDATE` itself; on failure the pool is
    /// left unchanged.
    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        business_id: &str,
        mission_id: &str,
        mission_type: MissionType,
    ) -> Result<EnergyPool> {
        let txn = self.db.begin().await?;
        let pool = self
            .consume_in(&txn, business_id, mission_id, mission_type)
            .await?;
        txn.commit().await?;
        Ok(pool)
    }

    /// [`Self::consume`] on a caller-supplied connection or transaction.
    pub async fn consume_in<C>(
        &self,
        conn: &C,
        business_id: &str,
        mission_id: &str,
        mission_type: MissionType,
    ) -> Result<EnergyPool>
    where
        C: ConnectionTrait,
    {
        let cost = self.cost_of(mission_type)?;
        let now = Utc::now();
        let unlimited = SubscriptionTier::Platinum.as_str();

        // The UPDATE runs before any read so a transaction takes the write lock up
        // front. PLATINUM floors `remaining` at zero and is never filtered out.
        let result = EnergyPoolEntity::update_many()
            .col_expr(
                energy_pool::Column::Remaining,
                Expr::cust_with_values(
                    r#"CASE WHEN "subscription_tier" = ? THEN MAX("remaining" - ?, 0) ELSE "remaining" - ? END"#,
                    [Value::from(unlimited), Value::from(cost), Value::from(cost)],
                ),
            )
            .col_expr(
                energy_pool::Column::Used,
                Expr::col(energy_pool::Column::Used).add(cost),
            )
            .col_expr(energy_pool::Column::UpdatedAt, Expr::value(now))
            .filter(energy_pool::Column::BusinessId.eq(business_id))
            .filter(
                Condition::any()
                    .add(energy_pool::Column::SubscriptionTier.eq(unlimited))
                    .add(energy_pool::Column::Remaining.gte(cost)),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let current = Self::require_in(conn, business_id).await?;
            warn!(
                "Insufficient energy for business {business_id}: {mission_type} costs {cost}, {} remaining",
                current.remaining
            );
            return Err(Error::InsufficientEnergy(self.shortfall(
                mission_type,
                cost,
                current.remaining,
            )));
        }

        append_ledger(
            conn,
            business_id,
            mission_id,
            mission_type,
            cost,
            energy_ledger::KIND_CONSUME,
            now,
        )
        .await?;

        let updated = Self::require_in(conn, business_id).await?;
        info!(
            "Consumed {cost} energy for {mission_type} mission {mission_id} (business {business_id}, remaining {})",
            updated.remaining
        );
        Ok(updated)
    }

    /// Returns the cost of a mission type to the pool.
    ///
    /// `remaining` is capped at the monthly limit and `used` floored at zero. The
    /// original ledger entry is kept; a separate refund entry is appended.
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        business_id: &str,
        mission_id: &str,
        mission_type: MissionType,
    ) -> Result<EnergyPool> {
        let cost = self.cost_of(mission_type)?;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let result = EnergyPoolEntity::update_many()
            .col_expr(
                energy_pool::Column::Remaining,
                Expr::cust_with_values(
                    r#"MAX("monthly_limit" - MAX("used" - ?, 0), 0)"#,
                    [cost],
                ),
            )
            .col_expr(
                energy_pool::Column::Used,
                Expr::cust_with_values(r#"MAX("used" - ?, 0)"#, [cost]),
            )
            .col_expr(energy_pool::Column::UpdatedAt, Expr::value(now))
            .filter(energy_pool::Column::BusinessId.eq(business_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(Error::EnergyPoolNotInitialized {
                business_id: business_id.to_string(),
            });
        }

        append_ledger(
            &txn,
            business_id,
            mission_id,
            mission_type,
            cost,
            energy_ledger::KIND_REFUND,
            now,
        )
        .await?;

        let updated = Self::require_in(&txn, business_id).await?;
        txn.commit().await?;

        info!(
            "Refunded {cost} energy for {mission_type} mission {mission_id} (business {business_id}, remaining {})",
            updated.remaining
        );
        Ok(updated)
    }

    /// Moves a pool to a new tier mid-cycle.
    ///
    /// Usage already consumed this cycle is kept: `remaining = max(0, new_limit - used)`.
    /// A business without a pool gets a fresh one for the new tier.
    #[instrument(skip(self))]
    pub async fn update_tier(
        &self,
        business_id: &str,
        new_tier: SubscriptionTier,
    ) -> Result<EnergyPool> {
        let txn = self.db.begin().await?;
        let pool = self.update_tier_in(&txn, business_id, new_tier).await?;
        txn.commit().await?;
        Ok(pool)
    }

    /// [`Self::update_tier`] on a caller-supplied connection or transaction.
    pub(crate) async fn update_tier_in<C>(
        &self,
        conn: &C,
        business_id: &str,
        new_tier: SubscriptionTier,
    ) -> Result<EnergyPool>
    where
        C: ConnectionTrait,
    {
        let new_limit = self.tables.monthly_limit(new_tier)?;

        let result = EnergyPoolEntity::update_many()
            .col_expr(
                energy_pool::Column::SubscriptionTier,
                Expr::value(new_tier.as_str()),
            )
            .col_expr(energy_pool::Column::MonthlyLimit, Expr::value(new_limit))
            .col_expr(
                energy_pool::Column::Remaining,
                Expr::cust_with_values(r#"MAX(? - "used", 0)"#, [new_limit]),
            )
            .col_expr(energy_pool::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(energy_pool::Column::BusinessId.eq(business_id))
            .exec(conn)
            .await?;

        let pool = if result.rows_affected == 0 {
            self.initialize_in(conn, business_id, new_tier, Utc::now())
                .await?
        } else {
            Self::require_in(conn, business_id).await?
        };

        info!(
            "Business {business_id} moved to {new_tier}: limit {}, used {}, remaining {}",
            pool.monthly_limit, pool.used, pool.remaining
        );
        Ok(pool)
    }

    /// Ledger entries for a business, newest first.
    pub async fn ledger(&self, business_id: &str) -> Result<Vec<energy_ledger::Model>> {
        EnergyLedger::find()
            .filter(energy_ledger::Column::BusinessId.eq(business_id))
            .order_by_desc(energy_ledger::Column::Timestamp)
            .order_by_desc(energy_ledger::Column::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Net usage per mission type for the pool's current cycle.
    pub async fn usage_summary(&self, business_id: &str) -> Result<UsageSummary> {
        let pool = Self::require_in(&self.db, business_id).await?;

        let entries = EnergyLedger::find()
            .filter(energy_ledger::Column::BusinessId.eq(business_id))
            .filter(energy_ledger::Column::Timestamp.gte(pool.cycle.start))
            .filter(energy_ledger::Column::Timestamp.lte(pool.cycle.end))
            .all(&self.db)
            .await?;

        let mut by_mission_type = BTreeMap::new();
        for entry in entries {
            let kind: MissionType = entry.mission_type.parse()?;
            let signed = if entry.kind == energy_ledger::KIND_REFUND {
                -entry.amount
            } else {
                entry.amount
            };
            *by_mission_type.entry(kind).or_insert(0) += signed;
        }

        Ok(UsageSummary {
            usage_percent: pool.usage_percent(),
            pool,
            by_mission_type,
        })
    }
}

async fn append_ledger<C>(
    conn: &C,
    business_id: &str,
    mission_id: &str,
    mission_type: MissionType,
    amount: i64,
    kind: &str,
    timestamp: DateTime<Utc>,
) -> Result<energy_ledger::Model>
where
    C: ConnectionTrait,
{
    let entry = energy_ledger::ActiveModel {
        business_id: Set(business_id.to_string()),
        mission_id: Set(mission_id.to_string()),
        mission_type: Set(mission_type.as_str().to_string()),
        amount: Set(amount),
        kind: Set(kind.to_string()),
        timestamp: Set(timestamp),
        ..Default::default()
    };
    entry.insert(conn).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_initialize_grants_full_budget() -> Result<()> {
        let (_db, pools) = setup_pools().await?;

        let pool = pools.initialize("biz", SubscriptionTier::Starter).await?;
        assert_eq!(pool.monthly_limit, 100);
        assert_eq!(pool.used, 0);
        assert_eq!(pool.remaining, 100);
        assert!(pool.cycle.contains(Utc::now()));
        assert!(!pool.is_stale(Utc::now()));

        Ok(())
    }

    #[tokio::test]
    async fn test_initialize_overwrites_existing_pool() -> Result<()> {
        let (_db, pools) = setup_pools().await?;

        pools.initialize("biz", SubscriptionTier::Starter).await?;
        pools.consume("biz", "daily_check_in", MissionType::CheckIn).await?;
        let pool = pools.initialize("biz", SubscriptionTier::Silver).await?;

        assert_eq!(pool.tier, SubscriptionTier::Silver);
        assert_eq!(pool.used, 0);
        assert_eq!(pool.remaining, 300);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_pool_is_not_initialized() -> Result<()> {
        let (_db, pools) = setup_pools().await?;

        let err = pools.get("nobody").await.unwrap_err();
        assert!(matches!(err, Error::EnergyPoolNotInitialized { .. }));
        assert_eq!(err.code(), "ENERGY_POOL_NOT_INITIALIZED");

        let err = pools
            .consume("nobody", "daily_check_in", MissionType::CheckIn)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnergyPoolNotInitialized { .. }));

        let err = pools
            .refund("nobody", "daily_check_in", MissionType::CheckIn)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnergyPoolNotInitialized { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_does_not_reset_stale_pool() -> Result<()> {
        let (db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;
        pools.consume("biz", "refer_friend", MissionType::ReferFriend).await?;
        backdate_pool(&db, "biz", 2).await?;

        let pool = pools.get("biz").await?;
        assert!(pool.is_stale(Utc::now()));
        assert_eq!(pool.used, 60);
        assert_eq!(pool.remaining, 40);
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_decrements_and_records_ledger() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;

        let pool = pools
            .consume("biz", "google_review", MissionType::GoogleReview)
            .await?;
        assert_eq!(pool.used, 25);
        assert_eq!(pool.remaining, 75);
        assert_eq!(pool.used + pool.remaining, pool.monthly_limit);

        let ledger = pools.ledger("biz").await?;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].mission_id, "google_review");
        assert_eq!(ledger[0].mission_type, "GOOGLE_REVIEW");
        assert_eq!(ledger[0].amount, 25);
        assert_eq!(ledger[0].kind, energy_ledger::KIND_CONSUME);
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_insufficient_leaves_pool_unchanged() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;
        pools.consume("biz", "refer_friend", MissionType::ReferFriend).await?;

        let err = pools
            .consume("biz", "invite_friends", MissionType::InviteFriends)
            .await
            .unwrap_err();
        match err {
            Error::InsufficientEnergy(shortfall) => {
                assert_eq!(shortfall.required, 60);
                assert_eq!(shortfall.remaining, 40);
                assert_eq!(shortfall.shortfall, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let pool = pools.get("biz").await?;
        assert_eq!(pool.used, 60);
        assert_eq!(pool.remaining, 40);
        assert_eq!(pools.ledger("biz").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_consumes_only_one_succeeds() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;

        let (first, second) = tokio::join!(
            pools.consume("biz", "refer_friend", MissionType::ReferFriend),
            pools.consume("biz", "invite_friends", MissionType::InviteFriends),
        );

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let failure = if first.is_err() { first } else { second };
        assert!(matches!(failure, Err(Error::InsufficientEnergy(_))));

        let pool = pools.get("biz").await?;
        assert_eq!(pool.used, 60);
        assert_eq!(pool.remaining, 40);
        assert_eq!(pools.ledger("biz").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_consumes_across_connections() -> Result<()> {
        let (_dir, db) = setup_file_db(8).await?;
        let pools = EnergyPoolManager::new(db, Arc::new(EnergyTables::default()));
        pools.initialize("biz", SubscriptionTier::Starter).await?;

        let mut handles = Vec::new();
        for attempt in 0..8 {
            let pools = pools.clone();
            handles.push(tokio::spawn(async move {
                pools
                    .consume("biz", &format!("refer_friend_{attempt}"), MissionType::ReferFriend)
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(Error::InsufficientEnergy(shortfall)) => assert_eq!(shortfall.remaining, 40),
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(succeeded, 1);

        let pool = pools.get("biz").await?;
        assert_eq!(pool.used, 60);
        assert_eq!(pool.remaining, 40);
        assert_eq!(pools.ledger("biz").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_platinum_never_blocks_but_tracks_usage() -> Result<()> {
        let (_db, pools) = setup_pools_with(EnergyTables {
            tier_limits: BTreeMap::from([
                (SubscriptionTier::Starter, 100),
                (SubscriptionTier::Silver, 300),
                (SubscriptionTier::Gold, 800),
                (SubscriptionTier::Platinum, 50),
            ]),
            ..EnergyTables::default()
        })
        .await?;
        pools.initialize("vip", SubscriptionTier::Platinum).await?;

        pools.consume("vip", "refer_friend", MissionType::ReferFriend).await?;
        let availability = pools
            .check_availability("vip", MissionType::ReferFriend)
            .await?;
        assert!(availability.is_available());
        let pool = pools.consume("vip", "invite_friends", MissionType::InviteFriends).await?;

        assert_eq!(pool.used, 120);
        assert_eq!(pool.remaining, 0);
        assert_eq!(pools.ledger("vip").await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_then_refund_restores_balance() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Silver).await?;
        pools.consume("biz", "daily_check_in", MissionType::CheckIn).await?;
        let before = pools.get("biz").await?;

        pools.consume("biz", "tiktok_video", MissionType::TiktokVideo).await?;
        let after = pools.refund("biz", "tiktok_video", MissionType::TiktokVideo).await?;

        assert_eq!(after.used, before.used);
        assert_eq!(after.remaining, before.remaining);

        // The consume entry stays; the refund is its own entry.
        let ledger = pools.ledger("biz").await?;
        assert_eq!(ledger.len(), 3);
        let kinds: Vec<&str> = ledger.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds.iter().filter(|k| **k == energy_ledger::KIND_REFUND).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == energy_ledger::KIND_CONSUME).count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_refund_caps_remaining_and_floors_used() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;
        pools.consume("biz", "daily_check_in", MissionType::CheckIn).await?;

        // Refunding more than was spent cannot push past the cycle budget.
        let pool = pools.refund("biz", "refer_friend", MissionType::ReferFriend).await?;
        assert_eq!(pool.remaining, 100);
        assert_eq!(pool.used, 0);
        assert_eq!(pool.used + pool.remaining, pool.monthly_limit);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_availability_does_not_mutate() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;

        let availability = pools.check_availability("biz", MissionType::ReferFriend).await?;
        assert_eq!(
            availability,
            Availability::Available {
                cost: 60,
                remaining_after: 40
            }
        );

        let pool = pools.get("biz").await?;
        assert_eq!(pool.remaining, 100);
        assert!(pools.ledger("biz").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_starter_scenario_suggests_affordable_alternatives() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("cafe", SubscriptionTier::Starter).await?;

        for mission_id in ["visit_store_weekday", "visit_store_weekend", "visit_store_happy_hour"] {
            pools.consume("cafe", mission_id, MissionType::VisitStore).await?;
        }

        let availability = pools.check_availability("cafe", MissionType::ReferFriend).await?;
        let Availability::Insufficient(shortfall) = availability else {
            panic!("expected insufficient energy");
        };
        assert_eq!(shortfall.remaining, 55);
        assert_eq!(shortfall.required, 60);
        assert_eq!(shortfall.shortfall, 5);
        assert!(shortfall.alternatives.len() <= MAX_ALTERNATIVES);
        assert!(!shortfall.alternatives.is_empty());
        assert!(shortfall.alternatives.iter().all(|alt| alt.cost <= 55));
        assert!(shortfall.alternatives.windows(2).all(|w| w[0].cost >= w[1].cost));
        let costs: Vec<i64> = shortfall.alternatives.iter().map(|alt| alt.cost).collect();
        assert_eq!(costs, vec![45, 45, 40]);
        assert!(
            shortfall
                .alternatives
                .iter()
                .all(|alt| alt.mission_type != MissionType::ReferFriend
                    && alt.mission_type != MissionType::InviteFriends)
        );

        let err = pools
            .consume("cafe", "refer_friend", MissionType::ReferFriend)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_ENERGY");
        Ok(())
    }

    #[tokio::test]
    async fn test_low_balance_suggests_check_in_style_missions() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("cafe", SubscriptionTier::Starter).await?;
        pools.consume("cafe", "refer_friend", MissionType::ReferFriend).await?;
        pools.consume("cafe", "write_review", MissionType::WriteReview).await?;

        // 15 left: only the cheapest band fits.
        let Availability::Insufficient(shortfall) =
            pools.check_availability("cafe", MissionType::ReferFriend).await?
        else {
            panic!("expected insufficient energy");
        };
        let suggested: Vec<MissionType> =
            shortfall.alternatives.iter().map(|alt| alt.mission_type).collect();
        assert_eq!(
            suggested,
            vec![MissionType::CheckIn, MissionType::VisitStore, MissionType::ScanQr]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_tier_upgrade_preserves_usage() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;
        pools.consume("biz", "photo_of_the_day", MissionType::PhotoUpload).await?;
        pools.consume("biz", "facebook_share", MissionType::FacebookPost).await?;
        assert_eq!(pools.get("biz").await?.used, 80);

        let pool = pools.update_tier("biz", SubscriptionTier::Gold).await?;
        assert_eq!(pool.monthly_limit, 800);
        assert_eq!(pool.used, 80);
        assert_eq!(pool.remaining, 720);
        Ok(())
    }

    #[tokio::test]
    async fn test_tier_downgrade_floors_remaining() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Silver).await?;
        for mission_id in ["refer_friend", "invite_friends"] {
            pools.consume("biz", mission_id, MissionType::ReferFriend).await?;
        }

        let pool = pools.update_tier("biz", SubscriptionTier::Starter).await?;
        assert_eq!(pool.monthly_limit, 100);
        assert_eq!(pool.used, 120);
        assert_eq!(pool.remaining, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_tier_creates_missing_pool() -> Result<()> {
        let (_db, pools) = setup_pools().await?;

        let pool = pools.update_tier("new", SubscriptionTier::Gold).await?;
        assert_eq!(pool.remaining, 800);
        assert_eq!(pool.used, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_usage_summary_nets_refunds() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Silver).await?;
        pools.consume("biz", "instagram_post", MissionType::InstagramPost).await?;
        pools.consume("biz", "daily_check_in", MissionType::CheckIn).await?;
        pools.refund("biz", "daily_check_in", MissionType::CheckIn).await?;

        let summary = pools.usage_summary("biz").await?;
        assert_eq!(summary.by_mission_type.get(&MissionType::InstagramPost), Some(&40));
        assert_eq!(summary.by_mission_type.get(&MissionType::CheckIn), Some(&0));
        assert!((summary.usage_percent - 40.0 / 300.0 * 100.0).abs() < 1e-9);
        Ok(())
    }
}

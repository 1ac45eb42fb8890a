//! Monthly energy reset.
//!
//! Pools are never reset lazily on read. A scheduled sweep ([`EnergyPoolManager::reset_all`])
//! refills every pool at the start of a month, and the last sweep date is kept in the
//! `system_state` table so a second run in the same month is a no-op.

use crate::{
    core::{cycle::CycleWindow, energy::EnergyPoolManager},
    entities::{EnergyPool as EnergyPoolEntity, SystemState, energy_pool, system_state},
    errors::{Error, Result},
    models::SubscriptionTier,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};

const LAST_ENERGY_RESET_KEY: &str = "last_energy_reset";

/// Pools fetched per page during a sweep.
pub const RESET_PAGE_SIZE: u64 = 100;

/// Outcome of a reset sweep. One failing pool never aborts the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetSummary {
    /// Pools refilled
    pub success_count: usize,
    /// Pools that could not be reset
    pub failed_count: usize,
    /// Businesses whose pool could not be reset
    pub failed_business_ids: Vec<String>,
}

impl EnergyPoolManager {
    /// Refills one pool for the month containing `now`: `used = 0`, `remaining = limit`.
    ///
    /// The limit is re-read from the tables for the pool's stored tier.
    #[instrument(skip(self))]
    pub async fn reset_one(&self, business_id: &str, now: DateTime<Utc>) -> Result<()> {
        let row = EnergyPoolEntity::find_by_id(business_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::EnergyPoolNotInitialized {
                business_id: business_id.to_string(),
            })?;
        self.reset_row(&row, now).await
    }

    async fn reset_row(&self, row: &energy_pool::Model, now: DateTime<Utc>) -> Result<()> {
        let tier: SubscriptionTier = row.subscription_tier.parse()?;
        let limit = self.tables.monthly_limit(tier)?;
        let cycle = CycleWindow::containing(now)?;

        EnergyPoolEntity::update_many()
            .col_expr(energy_pool::Column::MonthlyLimit, Expr::value(limit))
            .col_expr(energy_pool::Column::Used, Expr::value(0_i64))
            .col_expr(energy_pool::Column::Remaining, Expr::value(limit))
            .col_expr(energy_pool::Column::CycleStart, Expr::value(cycle.start))
            .col_expr(energy_pool::Column::CycleEnd, Expr::value(cycle.end))
            .col_expr(energy_pool::Column::LastReset, Expr::value(now))
            .col_expr(energy_pool::Column::UpdatedAt, Expr::value(now))
            .filter(energy_pool::Column::BusinessId.eq(row.business_id.as_str()))
            .exec(&self.db)
            .await?;

        info!(
            "Reset energy pool for business {} to {limit} ({tier})",
            row.business_id
        );
        Ok(())
    }

    /// Resets every pool, page by page. Failures are logged and counted per pool.
    #[instrument(skip(self))]
    pub async fn reset_all(&self, now: DateTime<Utc>) -> Result<ResetSummary> {
        let mut summary = ResetSummary::default();
        let mut pages = EnergyPoolEntity::find()
            .order_by_asc(energy_pool::Column::BusinessId)
            .paginate(&self.db, RESET_PAGE_SIZE);

        while let Some(rows) = pages.fetch_and_next().await? {
            for row in rows {
                match self.reset_row(&row, now).await {
                    Ok(()) => summary.success_count += 1,
                    Err(e) => {
                        warn!("Failed to reset energy pool for {}: {e}", row.business_id);
                        summary.failed_count += 1;
                        summary.failed_business_ids.push(row.business_id);
                    }
                }
            }
        }

        info!(
            "Energy reset finished: {} succeeded, {} failed",
            summary.success_count, summary.failed_count
        );
        Ok(summary)
    }

    /// Runs [`Self::reset_all`] unless a sweep already ran in the month of `now`.
    ///
    /// # Returns
    /// * `Ok(Some(summary))` - A sweep was performed
    /// * `Ok(None)` - Already reset this month
    pub async fn reset_all_if_due(&self, now: DateTime<Utc>) -> Result<Option<ResetSummary>> {
        let today = now.date_naive();
        if let Some(last) = self.last_reset_date().await? {
            if last.year() == today.year() && last.month() == today.month() {
                info!("Energy pools already reset for {}", today.format("%B %Y"));
                return Ok(None);
            }
        }

        let summary = self.reset_all(now).await?;
        if summary.failed_count > 0 {
            warn!(
                "{} pools were not reset and stay stale until the next sweep",
                summary.failed_count
            );
        }
        self.set_last_reset_date(today).await?;
        Ok(Some(summary))
    }

    /// Date the last monthly sweep ran, if any.
    pub async fn last_reset_date(&self) -> Result<Option<NaiveDate>> {
        let state = SystemState::find()
            .filter(system_state::Column::Key.eq(LAST_ENERGY_RESET_KEY))
            .one(&self.db)
            .await?;

        state
            .map(|s| {
                NaiveDate::parse_from_str(&s.value, "%Y-%m-%d").map_err(|e| Error::Config {
                    message: format!("Failed to parse last energy reset date: {e}"),
                })
            })
            .transpose()
    }

    async fn set_last_reset_date(&self, date: NaiveDate) -> Result<()> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let now = Utc::now().naive_utc();

        let existing = SystemState::find()
            .filter(system_state::Column::Key.eq(LAST_ENERGY_RESET_KEY))
            .one(&self.db)
            .await?;

        if let Some(state) = existing {
            let mut active_model: system_state::ActiveModel = state.into();
            active_model.value = Set(date_str);
            active_model.updated_at = Set(now);
            active_model.update(&self.db).await?;
        } else {
            system_state::ActiveModel {
                key: Set(LAST_ENERGY_RESET_KEY.to_string()),
                value: Set(date_str),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&self.db)
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::models::MissionType;
    use crate::test_utils::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_reset_one_refills_stale_pool() -> Result<()> {
        let (db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;
        pools.consume("biz", "refer_friend", MissionType::ReferFriend).await?;
        backdate_pool(&db, "biz", 1).await?;
        assert!(pools.get("biz").await?.is_stale(Utc::now()));

        pools.reset_one("biz", Utc::now()).await?;

        let pool = pools.get("biz").await?;
        assert_eq!(pool.used, 0);
        assert_eq!(pool.remaining, 100);
        assert!(!pool.is_stale(Utc::now()));
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_one_missing_pool() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        let err = pools.reset_one("nobody", Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::EnergyPoolNotInitialized { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_all_isolates_failures() -> Result<()> {
        let (db, pools) = setup_pools().await?;
        for (id, tier) in [
            ("a", SubscriptionTier::Starter),
            ("b", SubscriptionTier::Gold),
            ("c", SubscriptionTier::Platinum),
        ] {
            pools.initialize(id, tier).await?;
            pools.consume(id, "daily_check_in", MissionType::CheckIn).await?;
        }
        insert_corrupt_pool(&db, "broken").await?;

        let summary = pools.reset_all(Utc::now()).await?;
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.failed_business_ids, vec!["broken".to_string()]);

        for id in ["a", "b", "c"] {
            let pool = pools.get(id).await?;
            assert_eq!(pool.used, 0);
            assert_eq!(pool.remaining, pool.monthly_limit);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_all_applies_current_tier_limit() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Silver).await?;
        pools.update_tier("biz", SubscriptionTier::Gold).await?;

        pools.reset_all(Utc::now()).await?;
        let pool = pools.get("biz").await?;
        assert_eq!(pool.monthly_limit, 800);
        assert_eq!(pool.remaining, 800);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_all_if_due_runs_once_per_month() -> Result<()> {
        let (_db, pools) = setup_pools().await?;
        pools.initialize("biz", SubscriptionTier::Starter).await?;
        assert!(pools.last_reset_date().await?.is_none());

        let march = Utc.with_ymd_and_hms(2025, 3, 1, 0, 5, 0).unwrap();
        let first = pools.reset_all_if_due(march).await?;
        assert_eq!(first.unwrap().success_count, 1);
        assert_eq!(
            pools.last_reset_date().await?,
            Some(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );

        let later_in_march = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        assert!(pools.reset_all_if_due(later_in_march).await?.is_none());

        let april = Utc.with_ymd_and_hms(2025, 4, 1, 0, 5, 0).unwrap();
        assert!(pools.reset_all_if_due(april).await?.is_some());

        let count = SystemState::find()
            .filter(system_state::Column::Key.eq(LAST_ENERGY_RESET_KEY))
            .count(&pools.db)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }
}

//! Energy pool entity - One monthly energy budget per business.
//!
//! `remaining == max(monthly_limit - used, 0)` holds for every tier. Usage can pass
//! the limit only on PLATINUM (a soft ceiling) or after a mid-cycle downgrade.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Energy pool database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "energy_pools")]
pub struct Model {
    /// Owning business, also the primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub business_id: String,
    /// Subscription tier key (`"STARTER"`, `"SILVER"`, `"GOLD"`, `"PLATINUM"`)
    pub subscription_tier: String,
    /// Energy granted per cycle
    pub monthly_limit: i64,
    /// Energy spent this cycle
    pub used: i64,
    /// Energy still available this cycle
    pub remaining: i64,
    /// First instant of the cycle month
    pub cycle_start: DateTimeUtc,
    /// Last instant of the cycle month
    pub cycle_end: DateTimeUtc,
    /// When a reset was last applied
    pub last_reset: DateTimeUtc,
    /// When the pool was created
    pub created_at: DateTimeUtc,
    /// When the pool was last mutated
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `EnergyPool` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One pool has many ledger entries
    #[sea_orm(has_many = "super::energy_ledger::Entity")]
    LedgerEntries,
}

impl Related<super::energy_ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

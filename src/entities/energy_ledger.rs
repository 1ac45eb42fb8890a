//! Energy ledger entity - Append-only audit trail of pool consumption and refunds.
//!
//! Rows are written once and never updated. A refund is recorded as its own
//! `"refund"` row rather than by editing the `"consume"` row it reverses.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry written when energy is consumed
pub const KIND_CONSUME: &str = "consume";
/// Ledger entry written when energy is refunded
pub const KIND_REFUND: &str = "refund";

/// Energy ledger database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "energy_ledger")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Business whose pool changed
    pub business_id: String,
    /// Catalog mission the energy was spent on
    pub mission_id: String,
    /// Mission type key used to price the entry
    pub mission_type: String,
    /// Energy moved (always positive; `kind` gives the direction)
    pub amount: i64,
    /// `"consume"` or `"refund"`
    pub kind: String,
    /// When the entry was written
    pub timestamp: DateTimeUtc,
}

/// Defines relationships between ledger entries and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one pool
    #[sea_orm(
        belongs_to = "super::energy_pool::Entity",
        from = "Column::BusinessId",
        to = "super::energy_pool::Column::BusinessId"
    )]
    EnergyPool,
}

impl Related<super::energy_pool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnergyPool.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

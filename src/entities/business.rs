//! Business entity - The accounts that own energy pools and activate missions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Business database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "businesses")]
pub struct Model {
    /// Business identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Subscription tier key
    pub subscription_tier: String,
    /// Suspended businesses may not activate missions
    pub is_suspended: bool,
    /// When the business was created
    pub created_at: DateTimeUtc,
}

/// `Business` relationships are not navigated by the core
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

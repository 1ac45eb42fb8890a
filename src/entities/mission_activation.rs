//! Mission activation entity - A catalog mission made live for one business.
//!
//! Keyed by `"{business_id}_{mission_id}"`. Deactivation only flips `is_active`;
//! the row stays for history and is overwritten on reactivation.

use crate::models::RequirementSnapshot;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mission activation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mission_activations")]
pub struct Model {
    /// Composite key `"{business_id}_{mission_id}"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Business running the mission
    pub business_id: String,
    /// Catalog mission id
    pub mission_id: String,
    /// Mission type key the activation was priced with
    pub mission_type: String,
    /// Whether customers can currently complete the mission
    pub is_active: bool,
    /// Points awarded per completion
    pub reward_points: i64,
    /// Maximum number of completing customers
    pub max_participants: i64,
    /// Optional expiry
    pub expires_at: Option<DateTimeUtc>,
    /// Hours a customer must wait between completions
    pub cooldown_hours: i64,
    /// Whether completions need business approval
    pub requires_approval: bool,
    /// Check-in method key (`"qr_code"`, `"geolocation"`, `"manual"`)
    pub check_in_method: String,
    /// Business-side requirements as resolved at activation time
    #[sea_orm(column_type = "Json")]
    pub required_connections_business: RequirementSnapshot,
    /// Customer-side requirements as resolved at activation time
    #[sea_orm(column_type = "Json")]
    pub required_connections_user: RequirementSnapshot,
    /// Start of the current activation cycle
    pub activated_at: DateTimeUtc,
    /// When the mission was last deactivated
    pub deactivated_at: Option<DateTimeUtc>,
    /// Customers who completed the mission in this cycle
    pub current_participants: i64,
}

/// `MissionActivation` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

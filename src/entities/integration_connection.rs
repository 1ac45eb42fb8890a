//! Integration connection entity - "is this integration connected" flags.
//!
//! One row per (`owner_kind`, `owner_id`, `connection_type`). The core only reads
//! these; linking accounts happens elsewhere.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Integration connection database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "integration_connections")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `"business"` or `"user"`
    pub owner_kind: String,
    /// Business or user id
    pub owner_id: String,
    /// Connection type key (e.g. `"google_gbp"`)
    pub connection_type: String,
    /// Whether the integration is currently connected
    pub connected: bool,
    /// When the flag last changed
    pub updated_at: DateTimeUtc,
}

/// `IntegrationConnection` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

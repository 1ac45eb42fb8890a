//! Mission activation gate.
//!
//! A (business, mission) pair moves between ACTIVE and INACTIVE any number of
//! times. Going live requires, in order: a known catalog mission, a config within
//! bounds, an existing non-suspended business, every business-side connection, no
//! live activation for the pair, and enough energy. Energy consumption and the
//! activation record are written in one database transaction, so a failure at
//! any point leaves both untouched.
//!
//! Customer completions are checked against the user-side requirements that were
//! snapshotted onto the record at activation time, not the current catalog.

use crate::{
    config::catalog::MissionCatalog,
    core::{business, connections, energy::EnergyPoolManager},
    entities::{MissionActivation, mission_activation},
    errors::{Error, Result},
    models::{
        CheckInMethod, ConnectionOwner, ConnectionRequirement, MissionType, RequirementSnapshot,
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{DbErr, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Allowed reward per completion, in points.
pub const REWARD_POINTS_RANGE: RangeInclusive<i64> = 25..=500;

/// Allowed participant limit.
pub const MAX_PARTICIPANTS_RANGE: RangeInclusive<i64> = 1..=10_000;

/// Business-chosen settings for one activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationConfig {
    /// Points awarded per completion
    pub reward_points: i64,
    /// Maximum number of completing customers
    pub max_participants: i64,
    /// Optional expiry; must be in the future
    pub expires_at: Option<DateTime<Utc>>,
    /// Hours a customer waits between completions
    pub cooldown_hours: i64,
    /// Whether completions need business approval
    pub requires_approval: bool,
    /// How location-based completions are verified
    pub check_in_method: CheckInMethod,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            reward_points: 100,
            max_participants: 100,
            expires_at: None,
            cooldown_hours: 24,
            requires_approval: false,
            check_in_method: CheckInMethod::default(),
        }
    }
}

impl ActivationConfig {
    /// Checks every field against its bounds, naming the first offending field.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if !REWARD_POINTS_RANGE.contains(&self.reward_points) {
            return Err(Error::InvalidConfig {
                field: "reward",
                reason: format!(
                    "must be between {} and {}, got {}",
                    REWARD_POINTS_RANGE.start(),
                    REWARD_POINTS_RANGE.end(),
                    self.reward_points
                ),
            });
        }

        if !MAX_PARTICIPANTS_RANGE.contains(&self.max_participants) {
            return Err(Error::InvalidConfig {
                field: "max_participants",
                reason: format!(
                    "must be between {} and {}, got {}",
                    MAX_PARTICIPANTS_RANGE.start(),
                    MAX_PARTICIPANTS_RANGE.end(),
                    self.max_participants
                ),
            });
        }

        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(Error::InvalidConfig {
                    field: "expires_at",
                    reason: format!("must be in the future, got {}", expires_at.to_rfc3339()),
                });
            }
        }

        if self.cooldown_hours < 0 {
            return Err(Error::InvalidConfig {
                field: "cooldown_hours",
                reason: format!("cannot be negative, got {}", self.cooldown_hours),
            });
        }

        Ok(())
    }
}

/// A successful activation and what customers will need to complete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOutcome {
    /// The stored activation record
    pub activation: mission_activation::Model,
    /// User-side requirements, in declaration order
    pub user_requirements: Vec<ConnectionRequirement>,
}

/// Whether a customer may complete a mission right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionCheck {
    /// No activation, or the activation is inactive
    NotActive,
    /// Every user-side requirement is connected
    Allowed,
    /// The first requirement the customer has not connected
    MissingConnection(ConnectionRequirement),
}

impl CompletionCheck {
    /// Whether completion is allowed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Deterministic activation key for a (business, mission) pair.
#[must_use]
pub fn activation_id(business_id: &str, mission_id: &str) -> String {
    format!("{business_id}_{mission_id}")
}

/// Decides whether missions may go live and whether customers may complete them.
#[derive(Debug, Clone)]
pub struct MissionActivationGate {
    db: DatabaseConnection,
    pools: EnergyPoolManager,
    catalog: Arc<MissionCatalog>,
}

impl MissionActivationGate {
    /// Creates a gate spending energy through `pools` and resolving missions from `catalog`.
    #[must_use]
    pub fn new(pools: EnergyPoolManager, catalog: Arc<MissionCatalog>) -> Self {
        Self {
            db: pools.db.clone(),
            pools,
            catalog,
        }
    }

    /// The energy pool manager activations are paid through.
    #[must_use]
    pub const fn pools(&self) -> &EnergyPoolManager {
        &self.pools
    }

    /// Brings a catalog mission live for a business.
    #[instrument(skip(self, config))]
    pub async fn activate(
        &self,
        business_id: &str,
        mission_id: &str,
        config: ActivationConfig,
    ) -> Result<ActivationOutcome> {
        let template = self
            .catalog
            .find(mission_id)
            .ok_or_else(|| Error::MissionNotFound {
                mission_id: mission_id.to_string(),
            })?;
        let mission_type = template.mission_type;

        let now = Utc::now();
        config.validate(now)?;

        let (business_requirements, user_requirements) =
            self.catalog.requirements_for(mission_type);

        let business = business::get_business(&self.db, business_id).await?;
        if business.is_suspended {
            return Err(Error::Unauthorized {
                business_id: business_id.to_string(),
                reason: "business is suspended".to_string(),
            });
        }
        let tier = business::tier_of(&business)?;

        let connected =
            connections::connected_kinds(&self.db, ConnectionOwner::Business, business_id).await?;
        if let Some(missing) = connections::first_missing(&business_requirements, &connected) {
            warn!("Business {business_id} cannot activate {mission_id}: {missing} not connected");
            return Err(Error::MissingBusinessConnection {
                requirement: missing.clone(),
            });
        }

        let id = activation_id(business_id, mission_id);
        let txn = self.db.begin().await?;

        // Writes first: the pool insert takes the write lock before anything is read.
        self.pools.ensure_pool_in(&txn, business_id, tier).await?;

        let existing = MissionActivation::find_by_id(id.clone()).one(&txn).await?;
        if existing.as_ref().is_some_and(|record| record.is_active) {
            return Err(Error::AlreadyActive {
                business_id: business_id.to_string(),
                mission_id: mission_id.to_string(),
            });
        }

        self.pools
            .consume_in(&txn, business_id, mission_id, mission_type)
            .await?;

        let record = mission_activation::ActiveModel {
            id: Set(id),
            business_id: Set(business_id.to_string()),
            mission_id: Set(mission_id.to_string()),
            mission_type: Set(mission_type.as_str().to_string()),
            is_active: Set(true),
            reward_points: Set(config.reward_points),
            max_participants: Set(config.max_participants),
            expires_at: Set(config.expires_at),
            cooldown_hours: Set(config.cooldown_hours),
            requires_approval: Set(config.requires_approval),
            check_in_method: Set(config.check_in_method.as_str().to_string()),
            required_connections_business: Set(RequirementSnapshot(business_requirements)),
            required_connections_user: Set(RequirementSnapshot(user_requirements.clone())),
            activated_at: Set(now),
            deactivated_at: Set(None),
            current_participants: Set(0),
        };

        let activation = if existing.is_some() {
            // Only an inactive record may be overwritten.
            MissionActivation::update(record)
                .filter(mission_activation::Column::IsActive.eq(false))
                .exec(&txn)
                .await
                .map_err(|e| match e {
                    DbErr::RecordNotUpdated => Error::AlreadyActive {
                        business_id: business_id.to_string(),
                        mission_id: mission_id.to_string(),
                    },
                    other => other.into(),
                })?
        } else {
            record.insert(&txn).await?
        };

        txn.commit().await?;

        info!(
            "Activated {mission_type} mission {mission_id} for business {business_id} ({} user requirements)",
            user_requirements.len()
        );
        Ok(ActivationOutcome {
            activation,
            user_requirements,
        })
    }

    /// Takes a live mission offline. Spent energy is not refunded.
    #[instrument(skip(self))]
    pub async fn deactivate(
        &self,
        business_id: &str,
        mission_id: &str,
    ) -> Result<mission_activation::Model> {
        let record = self
            .get_activation(business_id, mission_id)
            .await?
            .ok_or_else(|| Error::ActivationNotFound {
                business_id: business_id.to_string(),
                mission_id: mission_id.to_string(),
            })?;

        if !record.is_active {
            return Err(Error::NotActive {
                business_id: business_id.to_string(),
                mission_id: mission_id.to_string(),
            });
        }

        let mut active_model: mission_activation::ActiveModel = record.into();
        active_model.is_active = Set(false);
        active_model.deactivated_at = Set(Some(Utc::now()));
        let updated = active_model.update(&self.db).await?;

        info!("Deactivated mission {mission_id} for business {business_id}");
        Ok(updated)
    }

    /// Checks a customer's connections against the activation's user-side snapshot.
    pub async fn can_user_complete_mission(
        &self,
        user_id: &str,
        mission_id: &str,
        business_id: &str,
    ) -> Result<CompletionCheck> {
        let Some(record) = self.get_activation(business_id, mission_id).await? else {
            return Ok(CompletionCheck::NotActive);
        };
        if !record.is_active {
            return Ok(CompletionCheck::NotActive);
        }

        if record.required_connections_user.is_empty() {
            return Ok(CompletionCheck::Allowed);
        }

        let connected =
            connections::connected_kinds(&self.db, ConnectionOwner::User, user_id).await?;
        Ok(
            connections::first_missing(record.required_connections_user.iter(), &connected)
                .map_or(CompletionCheck::Allowed, |missing| {
                    CompletionCheck::MissingConnection(missing.clone())
                }),
        )
    }

    /// Counts a customer completion against the participant limit.
    #[instrument(skip(self))]
    pub async fn record_completion(
        &self,
        user_id: &str,
        mission_id: &str,
        business_id: &str,
    ) -> Result<mission_activation::Model> {
        match self
            .can_user_complete_mission(user_id, mission_id, business_id)
            .await?
        {
            CompletionCheck::Allowed => {}
            CompletionCheck::NotActive => {
                return Err(Error::NotActive {
                    business_id: business_id.to_string(),
                    mission_id: mission_id.to_string(),
                });
            }
            CompletionCheck::MissingConnection(requirement) => {
                return Err(Error::MissingUserConnection { requirement });
            }
        }

        let id = activation_id(business_id, mission_id);
        let now = Utc::now();

        let record = self.require_activation(business_id, mission_id).await?;
        if record.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(Error::MissionExpired {
                mission_id: mission_id.to_string(),
            });
        }

        let result = MissionActivation::update_many()
            .col_expr(
                mission_activation::Column::CurrentParticipants,
                Expr::col(mission_activation::Column::CurrentParticipants).add(1),
            )
            .filter(mission_activation::Column::Id.eq(id.as_str()))
            .filter(mission_activation::Column::IsActive.eq(true))
            .filter(
                Expr::col(mission_activation::Column::CurrentParticipants)
                    .lt(Expr::col(mission_activation::Column::MaxParticipants)),
            )
            .exec(&self.db)
            .await?;

        let updated = self.require_activation(business_id, mission_id).await?;
        if result.rows_affected == 0 {
            if !updated.is_active {
                return Err(Error::NotActive {
                    business_id: business_id.to_string(),
                    mission_id: mission_id.to_string(),
                });
            }
            return Err(Error::MissionFull {
                mission_id: mission_id.to_string(),
                max_participants: updated.max_participants,
            });
        }

        info!(
            "User {user_id} completed mission {mission_id} for business {business_id} ({}/{})",
            updated.current_participants, updated.max_participants
        );
        Ok(updated)
    }

    /// The activation record for a pair, active or not.
    pub async fn get_activation(
        &self,
        business_id: &str,
        mission_id: &str,
    ) -> Result<Option<mission_activation::Model>> {
        MissionActivation::find_by_id(activation_id(business_id, mission_id))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    async fn require_activation(
        &self,
        business_id: &str,
        mission_id: &str,
    ) -> Result<mission_activation::Model> {
        self.get_activation(business_id, mission_id)
            .await?
            .ok_or_else(|| Error::ActivationNotFound {
                business_id: business_id.to_string(),
                mission_id: mission_id.to_string(),
            })
    }

    /// Live activations of a business, oldest first.
    pub async fn list_active(&self, business_id: &str) -> Result<Vec<mission_activation::Model>> {
        MissionActivation::find()
            .filter(mission_activation::Column::BusinessId.eq(business_id))
            .filter(mission_activation::Column::IsActive.eq(true))
            .order_by_asc(mission_activation::Column::ActivatedAt)
            .order_by_asc(mission_activation::Column::MissionId)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Mission type of a stored activation.
    pub fn mission_type_of(record: &mission_activation::Model) -> Result<MissionType> {
        record.mission_type.parse()
    }
}

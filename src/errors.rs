//! Unified error type for the energy pools and the activation gate.
//!
//! Every expected business-rule failure is its own variant carrying the details a
//! caller needs to render an actionable message. [`Error::code`] gives each variant a
//! stable machine-matchable code.

use crate::models::{ConnectionRequirement, MissionType};
use std::fmt;
use thiserror::Error;

/// Affordable alternative offered when a mission type is too expensive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionAlternative {
    /// The cheaper mission type
    pub mission_type: MissionType,
    /// Its energy cost
    pub cost: i64,
}

/// Details of an insufficient-energy failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyShortfall {
    /// The mission type that was requested
    pub mission_type: MissionType,
    /// Energy needed for it
    pub required: i64,
    /// Energy left in the pool
    pub remaining: i64,
    /// `required - remaining`
    pub shortfall: i64,
    /// Up to three affordable cheaper types, closest to the requested cost first
    pub alternatives: Vec<MissionAlternative>,
}

impl fmt::Display for EnergyShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: required {}, remaining {}",
            self.mission_type, self.required, self.remaining
        )
    }
}

/// Broad class of a failure, telling the caller what has to change before a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input; never retried
    Validation,
    /// Caller must change state first
    Precondition,
    /// Retry with a cheaper mission or after the monthly reset
    ResourceExhausted,
    /// An external integration must be connected out of band
    IntegrationGap,
    /// Storage, configuration or I/O failure
    Internal,
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored or supplied subscription tier is not recognised
    #[error("Unknown subscription tier: {value}")]
    UnknownTier {
        /// The offending value
        value: String,
    },

    /// A stored or supplied mission type is not recognised
    #[error("Unknown mission type: {value}")]
    UnknownMissionType {
        /// The offending value
        value: String,
    },

    /// No pool exists for the business
    #[error("Energy pool not initialized for business {business_id}")]
    EnergyPoolNotInitialized {
        /// Business without a pool
        business_id: String,
    },

    /// The pool cannot pay for the mission
    #[error("Insufficient energy for {0}")]
    InsufficientEnergy(EnergyShortfall),

    /// The mission id is not in the catalog
    #[error("Mission not found in catalog: {mission_id}")]
    MissionNotFound {
        /// Unknown mission id
        mission_id: String,
    },

    /// An activation config field is out of bounds
    #[error("Invalid activation config field '{field}': {reason}")]
    InvalidConfig {
        /// Name of the rejected field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The business lacks a connection the mission needs
    #[error("Business must connect {requirement} before activating this mission")]
    MissingBusinessConnection {
        /// The first missing requirement
        requirement: ConnectionRequirement,
    },

    /// The customer lacks a connection the mission needs
    #[error("Connect {requirement} to complete this mission")]
    MissingUserConnection {
        /// The first missing requirement
        requirement: ConnectionRequirement,
    },

    /// The (business, mission) pair is already live
    #[error("Mission {mission_id} is already active for business {business_id}")]
    AlreadyActive {
        /// Business id
        business_id: String,
        /// Catalog mission id
        mission_id: String,
    },

    /// The business does not exist
    #[error("Business not found: {business_id}")]
    BusinessNotFound {
        /// Unknown business id
        business_id: String,
    },

    /// The business may not activate missions
    #[error("Business {business_id} is not allowed to do this: {reason}")]
    Unauthorized {
        /// Business id
        business_id: String,
        /// Why
        reason: String,
    },

    /// No activation record exists for the pair
    #[error("No activation of mission {mission_id} for business {business_id}")]
    ActivationNotFound {
        /// Business id
        business_id: String,
        /// Catalog mission id
        mission_id: String,
    },

    /// The activation exists but is not live
    #[error("Mission {mission_id} is not active for business {business_id}")]
    NotActive {
        /// Business id
        business_id: String,
        /// Catalog mission id
        mission_id: String,
    },

    /// The activation's expiry has passed
    #[error("Mission {mission_id} has expired")]
    MissionExpired {
        /// Catalog mission id
        mission_id: String,
    },

    /// The activation reached its participant limit
    #[error("Mission {mission_id} is full ({max_participants} participants)")]
    MissionFull {
        /// Catalog mission id
        mission_id: String,
        /// Configured limit
        max_participants: i64,
    },
}

impl Error {
    /// Stable machine-matchable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::UnknownTier { .. } | Self::UnknownMissionType { .. } => {
                "CONFIG"
            }
            Self::Database(_) => "DATABASE",
            Self::Io(_) => "IO",
            Self::EnergyPoolNotInitialized { .. } => "ENERGY_POOL_NOT_INITIALIZED",
            Self::InsufficientEnergy(_) => "INSUFFICIENT_ENERGY",
            Self::MissionNotFound { .. } => "MISSION_NOT_FOUND",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingBusinessConnection { .. } => "MISSING_BUSINESS_CONNECTION",
            Self::MissingUserConnection { .. } => "MISSING_USER_CONNECTION",
            Self::AlreadyActive { .. } => "ALREADY_ACTIVE",
            Self::BusinessNotFound { .. } => "BUSINESS_NOT_FOUND",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::ActivationNotFound { .. } => "ACTIVATION_NOT_FOUND",
            Self::NotActive { .. } => "NOT_ACTIVE",
            Self::MissionExpired { .. } => "MISSION_EXPIRED",
            Self::MissionFull { .. } => "MISSION_FULL",
        }
    }

    /// Which class of failure this is.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } => ErrorCategory::Validation,
            Self::EnergyPoolNotInitialized { .. }
            | Self::MissionNotFound { .. }
            | Self::AlreadyActive { .. }
            | Self::BusinessNotFound { .. }
            | Self::Unauthorized { .. }
            | Self::ActivationNotFound { .. }
            | Self::NotActive { .. }
            | Self::MissionExpired { .. } => ErrorCategory::Precondition,
            Self::InsufficientEnergy(_) | Self::MissionFull { .. } => {
                ErrorCategory::ResourceExhausted
            }
            Self::MissingBusinessConnection { .. } | Self::MissingUserConnection { .. } => {
                ErrorCategory::IntegrationGap
            }
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::UnknownTier { .. }
            | Self::UnknownMissionType { .. } => ErrorCategory::Internal,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

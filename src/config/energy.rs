//! Energy tables: monthly limit per subscription tier and cost per mission type.
//!
//! The tables are immutable once built and are handed to
//! [`crate::core::energy::EnergyPoolManager`] at construction, so tests and
//! deployments can substitute their own numbers. Every [`MissionType`] must carry a
//! cost; a table that leaves one out is rejected by [`EnergyTables::validate`].

use crate::errors::{Error, Result};
use crate::models::{MissionType, SubscriptionTier};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Soft ceiling used for PLATINUM pools. Tracked for analytics, never enforced.
pub const PLATINUM_SOFT_CEILING: i64 = 10_000;

/// Cost bands used by the default table.
pub mod cost {
    /// Check-in and QR style missions
    pub const LOW: i64 = 15;
    /// Review missions
    pub const MEDIUM: i64 = 25;
    /// Photo and post missions
    pub const HIGH: i64 = 40;
    /// Story and video missions
    pub const HIGH_PLUS: i64 = 45;
    /// Referral and invite missions
    pub const VERY_HIGH: i64 = 60;
}

/// Monthly limits and mission costs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEnergyTables")]
pub struct EnergyTables {
    /// Monthly energy limit per tier
    pub tier_limits: BTreeMap<SubscriptionTier, i64>,
    /// Energy cost per mission type
    pub mission_costs: BTreeMap<MissionType, i64>,
}

/// Table shape as written in TOML, keyed by the string form of tiers and types.
#[derive(Debug, Deserialize)]
struct RawEnergyTables {
    tier_limits: BTreeMap<String, i64>,
    mission_costs: BTreeMap<String, i64>,
}

impl TryFrom<RawEnergyTables> for EnergyTables {
    type Error = Error;

    fn try_from(raw: RawEnergyTables) -> Result<Self> {
        let tier_limits = raw
            .tier_limits
            .into_iter()
            .map(|(key, limit)| Ok((key.parse::<SubscriptionTier>()?, limit)))
            .collect::<Result<_>>()?;
        let mission_costs = raw
            .mission_costs
            .into_iter()
            .map(|(key, cost)| Ok((key.parse::<MissionType>()?, cost)))
            .collect::<Result<_>>()?;

        Ok(Self {
            tier_limits,
            mission_costs,
        })
    }
}

impl Default for EnergyTables {
    fn default() -> Self {
        let tier_limits = BTreeMap::from([
            (SubscriptionTier::Starter, 100),
            (SubscriptionTier::Silver, 300),
            (SubscriptionTier::Gold, 800),
            (SubscriptionTier::Platinum, PLATINUM_SOFT_CEILING),
        ]);

        let mission_costs = MissionType::ALL
            .into_iter()
            .map(|kind| (kind, default_cost(kind)))
            .collect();

        Self {
            tier_limits,
            mission_costs,
        }
    }
}

const fn default_cost(kind: MissionType) -> i64 {
    match kind {
        MissionType::CheckIn | MissionType::VisitStore | MissionType::ScanQr => cost::LOW,
        MissionType::WriteReview | MissionType::GoogleReview => cost::MEDIUM,
        MissionType::PhotoUpload | MissionType::InstagramPost | MissionType::FacebookPost => {
            cost::HIGH
        }
        MissionType::InstagramStory | MissionType::TiktokVideo => cost::HIGH_PLUS,
        MissionType::ReferFriend | MissionType::InviteFriends => cost::VERY_HIGH,
    }
}

impl EnergyTables {
    /// Checks that every tier has a positive limit and every mission type a positive cost.
    pub fn validate(&self) -> Result<()> {
        for tier in SubscriptionTier::ALL {
            match self.tier_limits.get(&tier) {
                Some(limit) if *limit > 0 => {}
                Some(limit) => {
                    return Err(Error::Config {
                        message: format!("Monthly limit for {tier} must be positive, got {limit}"),
                    });
                }
                None => {
                    return Err(Error::Config {
                        message: format!("No monthly limit configured for tier {tier}"),
                    });
                }
            }
        }

        for kind in MissionType::ALL {
            match self.mission_costs.get(&kind) {
                Some(cost) if *cost > 0 => {}
                Some(cost) => {
                    return Err(Error::Config {
                        message: format!("Energy cost for {kind} must be positive, got {cost}"),
                    });
                }
                None => {
                    return Err(Error::Config {
                        message: format!("No energy cost configured for mission type {kind}"),
                    });
                }
            }
        }

        Ok(())
    }

    /// Monthly limit for a tier.
    ///
    /// Validated tables carry every tier; an unvalidated table missing one is a
    /// configuration error.
    pub fn monthly_limit(&self, tier: SubscriptionTier) -> Result<i64> {
        self.tier_limits
            .get(&tier)
            .copied()
            .ok_or_else(|| Error::Config {
                message: format!("No monthly limit configured for tier {tier}"),
            })
    }

    /// Energy cost of a mission type.
    ///
    /// Validated tables cost every type; an unvalidated table missing a type is a
    /// configuration error.
    pub fn cost_of(&self, kind: MissionType) -> Result<i64> {
        self.mission_costs
            .get(&kind)
            .copied()
            .ok_or_else(|| Error::Config {
                message: format!("No energy cost configured for mission type {kind}"),
            })
    }
}

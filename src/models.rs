//! Domain value types shared by the energy pools and the activation gate.
//!
//! Everything that is stored as a string column (tiers, mission types, connection
//! kinds) has an enum here with a canonical key and a forgiving parser, so the
//! rest of the crate never matches on raw strings.

use crate::errors::{Error, Result as CrateResult};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalizes a free-form key: trims, upper-cases and turns `-` and spaces into `_`.
fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Subscription tier of a business. Determines the monthly energy limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    /// Entry tier
    Starter,
    /// Second tier
    Silver,
    /// Third tier
    Gold,
    /// Soft-unlimited tier; usage is tracked but never blocked
    Platinum,
}

impl SubscriptionTier {
    /// All tiers, cheapest first.
    pub const ALL: [Self; 4] = [Self::Starter, Self::Silver, Self::Gold, Self::Platinum];

    /// Canonical storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "STARTER",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Platinum => "PLATINUM",
        }
    }

    /// Whether pools of this tier are never blocked by their balance.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Platinum)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = Error;

    fn from_str(s: &str) -> CrateResult<Self> {
        let key = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == key)
            .ok_or(Error::UnknownTier { value: s.to_string() })
    }
}

/// Every kind of mission the catalog can offer.
///
/// Costs are attached to these variants by [`crate::config::energy::EnergyTables`];
/// a variant without a cost is rejected when the tables are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionType {
    /// Check in at the location
    CheckIn,
    /// Visit the store
    VisitStore,
    /// Scan an in-store QR code
    ScanQr,
    /// Write a review on the platform
    WriteReview,
    /// Leave a review on the Google Business Profile
    GoogleReview,
    /// Upload a photo
    PhotoUpload,
    /// Publish an Instagram post
    InstagramPost,
    /// Publish a Facebook post
    FacebookPost,
    /// Publish an Instagram story
    InstagramStory,
    /// Publish a TikTok video
    TiktokVideo,
    /// Refer a friend
    ReferFriend,
    /// Invite several friends
    InviteFriends,
}

impl MissionType {
    /// All mission types in declaration order.
    pub const ALL: [Self; 12] = [
        Self::CheckIn,
        Self::VisitStore,
        Self::ScanQr,
        Self::WriteReview,
        Self::GoogleReview,
        Self::PhotoUpload,
        Self::InstagramPost,
        Self::FacebookPost,
        Self::InstagramStory,
        Self::TiktokVideo,
        Self::ReferFriend,
        Self::InviteFriends,
    ];

    /// Canonical storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "CHECK_IN",
            Self::VisitStore => "VISIT_STORE",
            Self::ScanQr => "SCAN_QR",
            Self::WriteReview => "WRITE_REVIEW",
            Self::GoogleReview => "GOOGLE_REVIEW",
            Self::PhotoUpload => "PHOTO_UPLOAD",
            Self::InstagramPost => "INSTAGRAM_POST",
            Self::FacebookPost => "FACEBOOK_POST",
            Self::InstagramStory => "INSTAGRAM_STORY",
            Self::TiktokVideo => "TIKTOK_VIDEO",
            Self::ReferFriend => "REFER_FRIEND",
            Self::InviteFriends => "INVITE_FRIENDS",
        }
    }
}

impl fmt::Display for MissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionType {
    type Err = Error;

    fn from_str(s: &str) -> CrateResult<Self> {
        let key = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or(Error::UnknownMissionType { value: s.to_string() })
    }
}

/// External integrations a business or customer may have connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Google Business Profile
    GoogleGbp,
    /// Instagram (business account for businesses)
    Instagram,
    /// Facebook
    Facebook,
    /// TikTok
    Tiktok,
}

impl ConnectionType {
    /// All connection types.
    pub const ALL: [Self; 4] = [Self::GoogleGbp, Self::Instagram, Self::Facebook, Self::Tiktok];

    /// Canonical storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoogleGbp => "google_gbp",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
            Self::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = Error;

    fn from_str(s: &str) -> CrateResult<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or_else(|| Error::Config {
                message: format!("Unknown connection type '{s}'"),
            })
    }
}

/// A named external-integration prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequirement {
    /// Which integration must be connected
    pub kind: ConnectionType,
    /// Human-readable name (e.g. "Google Business Profile")
    pub display_name: String,
    /// Why the mission needs it
    pub description: String,
    /// Where the owner can set it up
    pub setup_url: String,
}

impl fmt::Display for ConnectionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Ordered list of requirements, stored as a JSON snapshot on activation records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct RequirementSnapshot(pub Vec<ConnectionRequirement>);

impl RequirementSnapshot {
    /// Whether nothing is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Requirements in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRequirement> {
        self.0.iter()
    }
}

/// Who owns an integration connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionOwner {
    /// A business account
    Business,
    /// A customer account
    User,
}

impl ConnectionOwner {
    /// Canonical storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::User => "user",
        }
    }
}

/// How customers prove they completed a location-based mission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInMethod {
    /// Scan a QR code displayed at the business
    #[default]
    QrCode,
    /// Device location within the geofence
    Geolocation,
    /// Staff confirms manually
    Manual,
}

impl CheckInMethod {
    /// Canonical storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QrCode => "qr_code",
            Self::Geolocation => "geolocation",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for CheckInMethod {
    type Err = Error;

    fn from_str(s: &str) -> CrateResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr_code" => Ok(Self::QrCode),
            "geolocation" => Ok(Self::Geolocation),
            "manual" => Ok(Self::Manual),
            other => Err(Error::Config {
                message: format!("Unknown check-in method '{other}'"),
            }),
        }
    }
}

//! Mission catalog and connection-requirement table.
//!
//! The catalog lists the mission templates businesses can activate. The requirement
//! table says, per mission type, which integrations the business and the customer
//! must have connected. Mission types absent from the table require nothing.

use crate::errors::{Error, Result};
use crate::models::{ConnectionRequirement, ConnectionType, MissionType};
use serde::Deserialize;
use std::collections::HashSet;

/// A mission template businesses can activate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MissionTemplate {
    /// Catalog id, unique
    pub id: String,
    /// Display title
    pub title: String,
    /// Type used for pricing and requirement lookup
    pub mission_type: MissionType,
    /// Short description shown to businesses
    #[serde(default)]
    pub description: String,
}

/// Connections a mission type needs, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MissionRequirements {
    /// Mission type these requirements apply to
    pub mission_type: MissionType,
    /// Needed by the business to activate
    #[serde(default)]
    pub business: Vec<ConnectionRequirement>,
    /// Needed by the customer to complete
    #[serde(default)]
    pub user: Vec<ConnectionRequirement>,
}

/// Static catalog data handed to the activation gate at construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MissionCatalog {
    /// Mission templates
    pub missions: Vec<MissionTemplate>,
    /// Requirement table keyed by mission type
    #[serde(default)]
    pub requirements: Vec<MissionRequirements>,
}

impl MissionCatalog {
    /// Checks ids are present and unique and that no type has two requirement rows.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for mission in &self.missions {
            if mission.id.trim().is_empty() {
                return Err(Error::Config {
                    message: "Catalog mission id cannot be empty".to_string(),
                });
            }
            if !ids.insert(mission.id.as_str()) {
                return Err(Error::Config {
                    message: format!("Duplicate catalog mission id '{}'", mission.id),
                });
            }
        }

        let mut typed = HashSet::new();
        for row in &self.requirements {
            if !typed.insert(row.mission_type) {
                return Err(Error::Config {
                    message: format!("Duplicate requirement row for {}", row.mission_type),
                });
            }
        }

        Ok(())
    }

    /// Looks up a template by id.
    #[must_use]
    pub fn find(&self, mission_id: &str) -> Option<&MissionTemplate> {
        self.missions.iter().find(|m| m.id == mission_id)
    }

    /// Business-side and user-side requirements for a mission type.
    #[must_use]
    pub fn requirements_for(
        &self,
        mission_type: MissionType,
    ) -> (Vec<ConnectionRequirement>, Vec<ConnectionRequirement>) {
        self.requirements
            .iter()
            .find(|row| row.mission_type == mission_type)
            .map_or_else(
                || (Vec::new(), Vec::new()),
                |row| (row.business.clone(), row.user.clone()),
            )
    }
}

fn template(id: &str, title: &str, mission_type: MissionType, description: &str) -> MissionTemplate {
    MissionTemplate {
        id: id.to_string(),
        title: title.to_string(),
        mission_type,
        description: description.to_string(),
    }
}

fn business_requirement(kind: ConnectionType) -> ConnectionRequirement {
    let (display_name, description) = match kind {
        ConnectionType::GoogleGbp => (
            "Google Business Profile",
            "Reviews are posted to your Google Business Profile",
        ),
        ConnectionType::Instagram => (
            "Instagram Business",
            "Posts must tag your Instagram Business account",
        ),
        ConnectionType::Facebook => ("Facebook Page", "Shares must link to your Facebook Page"),
        ConnectionType::Tiktok => ("TikTok Business", "Videos must tag your TikTok account"),
    };
    ConnectionRequirement {
        kind,
        display_name: display_name.to_string(),
        description: description.to_string(),
        setup_url: format!("/business/settings/integrations/{kind}"),
    }
}

fn user_requirement(kind: ConnectionType) -> ConnectionRequirement {
    let (display_name, description) = match kind {
        ConnectionType::GoogleGbp => ("Google", "Needed to verify your Google review"),
        ConnectionType::Instagram => ("Instagram", "Needed to verify your post or story"),
        ConnectionType::Facebook => ("Facebook", "Needed to verify your share"),
        ConnectionType::Tiktok => ("TikTok", "Needed to verify your video"),
    };
    ConnectionRequirement {
        kind,
        display_name: display_name.to_string(),
        description: description.to_string(),
        setup_url: format!("/profile/connections/{kind}"),
    }
}

impl Default for MissionCatalog {
    fn default() -> Self {
        use MissionType as T;

        let missions = vec![
            template("daily_check_in", "Daily Check-In", T::CheckIn, "Check in at the counter"),
            template("visit_store_weekday", "Weekday Visit", T::VisitStore, "Visit Monday to Friday"),
            template("visit_store_weekend", "Weekend Visit", T::VisitStore, "Visit on the weekend"),
            template("visit_store_happy_hour", "Happy Hour Visit", T::VisitStore, "Visit 4pm to 6pm"),
            template("scan_table_qr", "Scan the Table QR", T::ScanQr, "Scan the code on your table"),
            template("write_review", "Write a Review", T::WriteReview, "Review us in the app"),
            template("google_review", "Google Review", T::GoogleReview, "Review us on Google"),
            template("photo_of_the_day", "Photo of the Day", T::PhotoUpload, "Upload a photo"),
            template("instagram_post", "Instagram Post", T::InstagramPost, "Post and tag us"),
            template("facebook_share", "Facebook Share", T::FacebookPost, "Share our page"),
            template("instagram_story", "Instagram Story", T::InstagramStory, "Story and tag us"),
            template("tiktok_video", "TikTok Video", T::TiktokVideo, "Film a short video"),
            template("refer_friend", "Refer a Friend", T::ReferFriend, "Bring a new customer"),
            template("invite_friends", "Invite Friends", T::InviteFriends, "Invite three friends"),
        ];

        let social = |mission_type: T, kind: ConnectionType| MissionRequirements {
            mission_type,
            business: vec![business_requirement(kind)],
            user: vec![user_requirement(kind)],
        };

        let requirements = vec![
            MissionRequirements {
                mission_type: T::GoogleReview,
                business: vec![business_requirement(ConnectionType::GoogleGbp)],
                user: Vec::new(),
            },
            social(T::InstagramPost, ConnectionType::Instagram),
            social(T::InstagramStory, ConnectionType::Instagram),
            social(T::FacebookPost, ConnectionType::Facebook),
            social(T::TiktokVideo, ConnectionType::Tiktok),
        ];

        Self {
            missions,
            requirements,
        }
    }
}

//! Integration connection flags for businesses and customers.
//!
//! Only connection *status* lives here. Linking accounts with the external
//! platforms happens outside this crate, which records the result with
//! [`set_connection`].

use crate::{
    entities::{IntegrationConnection, integration_connection},
    errors::Result,
    models::{ConnectionOwner, ConnectionRequirement, ConnectionType},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Records whether an owner has an integration connected, replacing any previous flag.
pub async fn set_connection<C>(
    db: &C,
    owner: ConnectionOwner,
    owner_id: &str,
    kind: ConnectionType,
    connected: bool,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = IntegrationConnection::find()
        .filter(integration_connection::Column::OwnerKind.eq(owner.as_str()))
        .filter(integration_connection::Column::OwnerId.eq(owner_id))
        .filter(integration_connection::Column::ConnectionType.eq(kind.as_str()))
        .one(db)
        .await?;

    if let Some(row) = existing {
        let mut active_model: integration_connection::ActiveModel = row.into();
        active_model.connected = Set(connected);
        active_model.updated_at = Set(Utc::now());
        active_model.update(db).await?;
    } else {
        integration_connection::ActiveModel {
            owner_kind: Set(owner.as_str().to_string()),
            owner_id: Set(owner_id.to_string()),
            connection_type: Set(kind.as_str().to_string()),
            connected: Set(connected),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    debug!(
        "{} {owner_id} {kind} connected: {connected}",
        owner.as_str()
    );
    Ok(())
}

/// Integrations currently connected for an owner.
///
/// Rows with an unrecognised connection type are skipped.
pub async fn connected_kinds<C>(
    db: &C,
    owner: ConnectionOwner,
    owner_id: &str,
) -> Result<HashSet<ConnectionType>>
where
    C: ConnectionTrait,
{
    let rows = IntegrationConnection::find()
        .filter(integration_connection::Column::OwnerKind.eq(owner.as_str()))
        .filter(integration_connection::Column::OwnerId.eq(owner_id))
        .filter(integration_connection::Column::Connected.eq(true))
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| match row.connection_type.parse() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("Ignoring connection row {}: {e}", row.id);
                None
            }
        })
        .collect())
}

/// The first requirement, in declaration order, that `connected` does not satisfy.
#[must_use]
pub fn first_missing<'a, I>(
    requirements: I,
    connected: &HashSet<ConnectionType>,
) -> Option<&'a ConnectionRequirement>
where
    I: IntoIterator<Item = &'a ConnectionRequirement>,
{
    requirements
        .into_iter()
        .find(|requirement| !connected.contains(&requirement.kind))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn requirement(kind: ConnectionType) -> ConnectionRequirement {
        ConnectionRequirement {
            kind,
            display_name: kind.to_string(),
            description: String::new(),
            setup_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_set_connection_upserts() -> Result<()> {
        let db = setup_test_db().await?;
        set_connection(&db, ConnectionOwner::User, "u1", ConnectionType::Instagram, true).await?;
        set_connection(&db, ConnectionOwner::User, "u1", ConnectionType::Tiktok, true).await?;
        set_connection(&db, ConnectionOwner::User, "u1", ConnectionType::Tiktok, false).await?;

        let kinds = connected_kinds(&db, ConnectionOwner::User, "u1").await?;
        assert_eq!(kinds, HashSet::from([ConnectionType::Instagram]));
        assert_eq!(IntegrationConnection::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_owner_kinds_are_separate() -> Result<()> {
        let db = setup_test_db().await?;
        set_connection(&db, ConnectionOwner::Business, "x", ConnectionType::Facebook, true).await?;

        assert!(connected_kinds(&db, ConnectionOwner::User, "x").await?.is_empty());
        assert_eq!(
            connected_kinds(&db, ConnectionOwner::Business, "x").await?.len(),
            1
        );
        Ok(())
    }

    #[test]
    fn test_first_missing_keeps_declaration_order() {
        let requirements = vec![
            requirement(ConnectionType::Instagram),
            requirement(ConnectionType::Facebook),
        ];

        let none = HashSet::new();
        assert_eq!(
            first_missing(&requirements, &none).unwrap().kind,
            ConnectionType::Instagram
        );

        let instagram = HashSet::from([ConnectionType::Instagram]);
        assert_eq!(
            first_missing(&requirements, &instagram).unwrap().kind,
            ConnectionType::Facebook
        );

        let both = HashSet::from([ConnectionType::Instagram, ConnectionType::Facebook]);
        assert!(first_missing(&requirements, &both).is_none());
    }
}

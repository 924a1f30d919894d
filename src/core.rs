//! Core domain types and service traits for Fanout
//!
//! This module defines the identities, notification configuration and change
//! events the resolver and dispatcher operate on, together with the trait
//! contracts for the storage collaborators they consume.

use crate::store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Entity type name for persons.
pub const PERSON: &str = "person";
/// Entity type name for teams.
pub const TEAM: &str = "team";
/// Entity type name for conversation threads (tasks, announcements, conversations).
pub const THREAD: &str = "thread";

/// The two kinds of identity that can receive notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Person,
    Team,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Person => PERSON,
            IdentityKind::Team => TEAM,
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed pointer to any entity in the relationship graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: String,
}

impl EntityRef {
    pub fn new(id: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
        }
    }

    pub fn person(id: Uuid) -> Self {
        Self::new(id, PERSON)
    }

    pub fn team(id: Uuid) -> Self {
        Self::new(id, TEAM)
    }

    /// Returns the identity kind if this reference points at a person or a team.
    pub fn identity_kind(&self) -> Option<IdentityKind> {
        match self.entity_type.as_str() {
            PERSON => Some(IdentityKind::Person),
            TEAM => Some(IdentityKind::Team),
            _ => None,
        }
    }
}

/// The notification transport a destination delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelType {
    Email,
    Slack,
    MsTeams,
    GChat,
    Generic,
}

impl ChannelType {
    /// Returns `true` for every channel that delivers to a webhook endpoint.
    pub fn is_webhook(&self) -> bool {
        !matches!(self, ChannelType::Email)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Slack => "slack",
            ChannelType::MsTeams => "ms-teams",
            ChannelType::GChat => "g-chat",
            ChannelType::Generic => "generic",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single configured webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Webhook {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
        }
    }
}

/// Per-channel webhook configuration of a notification profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<Webhook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms_teams: Option<Webhook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g_chat: Option<Webhook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<Webhook>,
}

impl SubscriptionConfig {
    /// Maps a channel to the profile field holding its webhook.
    ///
    /// Email has no webhook field; its address is read from the identity itself.
    pub fn webhook_for(&self, channel: ChannelType) -> Option<&Webhook> {
        match channel {
            ChannelType::Email => None,
            ChannelType::Slack => self.slack.as_ref(),
            ChannelType::MsTeams => self.ms_teams.as_ref(),
            ChannelType::GChat => self.g_chat.as_ref(),
            ChannelType::Generic => self.generic.as_ref(),
        }
    }

    /// The profile field holding the webhook of `channel`, `None` for email.
    pub fn webhook_for_mut(&mut self, channel: ChannelType) -> Option<&mut Option<Webhook>> {
        match channel {
            ChannelType::Email => None,
            ChannelType::Slack => Some(&mut self.slack),
            ChannelType::MsTeams => Some(&mut self.ms_teams),
            ChannelType::GChat => Some(&mut self.g_chat),
            ChannelType::Generic => Some(&mut self.generic),
        }
    }
}

/// Notification settings of a person or team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionConfig>,
}

/// A person or team as loaded from the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub kind: IdentityKind,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub profile: Option<NotificationProfile>,
}

impl Identity {
    pub fn person(name: &str) -> Self {
        Self::new(IdentityKind::Person, name)
    }

    pub fn team(name: &str) -> Self {
        Self::new(IdentityKind::Team, name)
    }

    fn new(kind: IdentityKind, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
            email: None,
            is_admin: false,
            profile: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// Convenience for attaching a single-channel webhook profile.
    pub fn with_webhook(mut self, channel: ChannelType, endpoint: &str) -> Self {
        let profile = self.profile.get_or_insert_with(NotificationProfile::default);
        let subscription = profile
            .subscription
            .get_or_insert_with(SubscriptionConfig::default);
        if let Some(field) = subscription.webhook_for_mut(channel) {
            *field = Some(Webhook::new(endpoint));
        }
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.id, self.kind.as_str())
    }
}

/// Who should be notified for a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    #[serde(default)]
    pub references: Vec<EntityRef>,
    #[serde(default)]
    pub notify_admins: bool,
    #[serde(default)]
    pub notify_owners: bool,
    #[serde(default)]
    pub notify_followers: bool,
}

/// A change on a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(event_type: &str, entity_type: &str, entity_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            timestamp: Utc::now(),
        }
    }

    pub fn is_thread(&self) -> bool {
        self.entity_type == THREAD
    }
}

/// Edge kinds of the relationship graph consulted during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Owns,
    Follows,
    /// Team membership: a team *has* a person.
    Has,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Relationship::Owns => "owns",
            Relationship::Follows => "follows",
            Relationship::Has => "has",
        };
        f.write_str(name)
    }
}

/// Which end of a relationship edge the queried entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges pointing at the entity; returns their sources.
    Incoming,
    /// Edges leaving the entity; returns their targets.
    Outgoing,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Cursor for the next page, `None` when the listing is exhausted.
    pub after: Option<String>,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Looks up persons and teams.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Lists administrators, one page at a time.
    ///
    /// # Arguments
    /// * `page_size` - The maximum number of identities per page
    /// * `after` - The cursor returned by the previous page, `None` for the first
    async fn list_admins(
        &self,
        page_size: usize,
        after: Option<String>,
    ) -> Result<Page<Identity>, StoreError>;

    /// Loads a single identity with its email and profile.
    ///
    /// # Returns
    /// * `Err(StoreError::NotFound)` if no such identity exists
    async fn load(&self, kind: IdentityKind, id: Uuid) -> Result<Identity, StoreError>;
}

/// Traverses the entity relationship graph.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Finds entities related to `entity_id` by `relationship` in `direction`.
    async fn find_related(
        &self,
        entity_id: Uuid,
        entity_type: &str,
        relationship: Relationship,
        direction: Direction,
    ) -> Result<Vec<EntityRef>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_identity_kind() {
        let id = Uuid::new_v4();
        assert_eq!(EntityRef::person(id).identity_kind(), Some(IdentityKind::Person));
        assert_eq!(EntityRef::team(id).identity_kind(), Some(IdentityKind::Team));
        assert_eq!(EntityRef::new(id, "table").identity_kind(), None);
    }

    #[test]
    fn test_webhook_for_maps_each_channel_to_its_field() {
        let config = SubscriptionConfig {
            slack: Some(Webhook::new("https://slack")),
            ms_teams: Some(Webhook::new("https://teams")),
            g_chat: Some(Webhook::new("https://gchat")),
            generic: Some(Webhook::new("https://generic")),
        };

        let endpoint = |c| config.webhook_for(c).and_then(|w| w.endpoint.as_deref());
        assert_eq!(endpoint(ChannelType::Slack), Some("https://slack"));
        assert_eq!(endpoint(ChannelType::MsTeams), Some("https://teams"));
        assert_eq!(endpoint(ChannelType::GChat), Some("https://gchat"));
        assert_eq!(endpoint(ChannelType::Generic), Some("https://generic"));
        assert_eq!(endpoint(ChannelType::Email), None);
    }

    #[test]
    fn test_with_webhook_fills_the_field_read_back_for_each_channel() {
        let channels = [
            ChannelType::Slack,
            ChannelType::MsTeams,
            ChannelType::GChat,
            ChannelType::Generic,
        ];
        for channel in channels {
            let identity = Identity::person("alice").with_webhook(channel, "https://hooks.test");
            let subscription = identity.profile.and_then(|p| p.subscription).unwrap();

            for other in channels {
                let endpoint = subscription
                    .webhook_for(other)
                    .and_then(|w| w.endpoint.as_deref());
                let expected = (other == channel).then_some("https://hooks.test");
                assert_eq!(endpoint, expected, "{channel} read as {other}");
            }
        }
    }

    #[test]
    fn test_with_webhook_ignores_email() {
        let identity = Identity::person("alice").with_webhook(ChannelType::Email, "https://x");
        let subscription = identity.profile.and_then(|p| p.subscription).unwrap();

        assert_eq!(subscription, SubscriptionConfig::default());
    }

    #[test]
    fn test_action_deserializes_with_defaults() {
        let action: NotificationAction =
            serde_json::from_str(r#"{ "notifyOwners": true }"#).unwrap();
        assert!(action.references.is_empty());
        assert!(action.notify_owners);
        assert!(!action.notify_admins);
        assert!(!action.notify_followers);
    }
}

//! Recipient resolution.
//!
//! Turns a [`NotificationAction`] into the deduplicated set of addresses
//! (emails or webhook endpoints, depending on the channel) that should receive
//! a notification about an entity. Each recipient category is resolved
//! independently: a store failure in one category is recorded as a
//! [`CategoryFault`] and does not affect the others.

pub mod assignees;

use crate::core::{
    ChannelType, Direction, EntityRef, Identity, IdentityKind, IdentityStore, NotificationAction,
    Relationship, RelationshipStore,
};
use crate::profile::webhook_endpoint;
use crate::store::StoreError;
use futures::future::join_all;
use itertools::{Either, Itertools};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Page size used when enumerating administrators.
pub const DEFAULT_ADMIN_PAGE_SIZE: usize = 50;

/// The independent sources of recipients for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientCategory {
    References,
    Admins,
    Owners,
    Followers,
}

impl fmt::Display for RecipientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecipientCategory::References => "references",
            RecipientCategory::Admins => "admins",
            RecipientCategory::Owners => "owners",
            RecipientCategory::Followers => "followers",
        };
        f.write_str(name)
    }
}

/// The result of resolving a single recipient category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome {
    Resolved(HashSet<String>),
    Failed(StoreError),
}

impl CategoryOutcome {
    /// The resolved addresses; a failed category contributes none.
    pub fn into_addresses(self) -> HashSet<String> {
        match self {
            CategoryOutcome::Resolved(addresses) => addresses,
            CategoryOutcome::Failed(_) => HashSet::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CategoryOutcome::Failed(_))
    }
}

impl From<Result<HashSet<String>, StoreError>> for CategoryOutcome {
    fn from(result: Result<HashSet<String>, StoreError>) -> Self {
        match result {
            Ok(addresses) => CategoryOutcome::Resolved(addresses),
            Err(e) => CategoryOutcome::Failed(e),
        }
    }
}

/// A category that could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFault {
    pub category: RecipientCategory,
    pub error: StoreError,
}

/// The union of all enabled recipient categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverList {
    pub addresses: HashSet<String>,
    pub faults: Vec<CategoryFault>,
}

impl ReceiverList {
    fn absorb(&mut self, category: RecipientCategory, outcome: CategoryOutcome) {
        match outcome {
            CategoryOutcome::Resolved(addresses) => {
                debug!(%category, count = addresses.len(), "Resolved recipient category");
                self.addresses.extend(addresses);
            }
            CategoryOutcome::Failed(e) => {
                error!(%category, error = %e, "Failed to resolve recipients, skipping category");
                metrics::counter!(
                    "recipient_resolution_failures_total",
                    "category" => category.to_string()
                )
                .increment(1);
                self.faults.push(CategoryFault { category, error: e });
            }
        }
    }

    /// The addresses in lexicographic order.
    pub fn sorted(&self) -> Vec<&str> {
        self.addresses.iter().map(String::as_str).sorted().collect()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Resolves notification actions against the identity and relationship stores.
#[derive(Clone)]
pub struct RecipientResolver {
    identities: Arc<dyn IdentityStore>,
    relationships: Arc<dyn RelationshipStore>,
    admin_page_size: usize,
}

impl RecipientResolver {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        relationships: Arc<dyn RelationshipStore>,
    ) -> Self {
        Self {
            identities,
            relationships,
            admin_page_size: DEFAULT_ADMIN_PAGE_SIZE,
        }
    }

    pub fn with_admin_page_size(mut self, page_size: usize) -> Self {
        self.admin_page_size = page_size.max(1);
        self
    }

    /// Computes the full receiver list for an action on an entity.
    ///
    /// Explicit references are always expanded; admins, owners and followers
    /// only when the corresponding flag of the action is set. The enabled
    /// categories are resolved concurrently.
    #[instrument(skip(self, action))]
    pub async fn build_receiver_list(
        &self,
        action: &NotificationAction,
        channel: ChannelType,
        entity_id: Uuid,
        entity_type: &str,
    ) -> ReceiverList {
        let references = self.explicit_references(&action.references, channel);
        let admins = async {
            if action.notify_admins {
                Some(self.admins(channel).await)
            } else {
                None
            }
        };
        let owners = async {
            if action.notify_owners {
                Some(
                    self.owners_or_followers(channel, entity_id, entity_type, Relationship::Owns)
                        .await,
                )
            } else {
                None
            }
        };
        let followers = async {
            if action.notify_followers {
                Some(
                    self.owners_or_followers(channel, entity_id, entity_type, Relationship::Follows)
                        .await,
                )
            } else {
                None
            }
        };

        let (references, admins, owners, followers) =
            tokio::join!(references, admins, owners, followers);

        let mut list = ReceiverList::default();
        list.absorb(RecipientCategory::References, references);
        let optional = [
            (RecipientCategory::Admins, admins),
            (RecipientCategory::Owners, owners),
            (RecipientCategory::Followers, followers),
        ];
        for (category, outcome) in optional {
            if let Some(outcome) = outcome {
                list.absorb(category, outcome);
            }
        }
        list
    }

    /// Addresses of the persons and teams referenced directly by an action.
    pub async fn explicit_references(
        &self,
        references: &[EntityRef],
        channel: ChannelType,
    ) -> CategoryOutcome {
        self.addresses_for_refs(references, channel).await.into()
    }

    /// Addresses of every administrator, enumerated page by page.
    pub async fn admins(&self, channel: ChannelType) -> CategoryOutcome {
        self.enumerate_admins(channel).await.into()
    }

    async fn enumerate_admins(&self, channel: ChannelType) -> Result<HashSet<String>, StoreError> {
        let mut addresses = HashSet::new();
        let mut after = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .identities
                .list_admins(self.admin_page_size, after)
                .await?;
            pages += 1;
            addresses.extend(addresses_for(&page.data, channel));
            match page.after {
                Some(next) => after = Some(next),
                None => break,
            }
        }
        debug!(pages, count = addresses.len(), "Enumerated administrators");
        Ok(addresses)
    }

    /// Addresses of the persons and teams owning or following an entity.
    pub async fn owners_or_followers(
        &self,
        channel: ChannelType,
        entity_id: Uuid,
        entity_type: &str,
        relationship: Relationship,
    ) -> CategoryOutcome {
        let result = async {
            let related = self
                .relationships
                .find_related(entity_id, entity_type, relationship, Direction::Incoming)
                .await?;
            self.addresses_for_refs(&related, channel).await
        };
        result.await.into()
    }

    /// Loads the referenced persons and teams and extracts their addresses.
    async fn addresses_for_refs(
        &self,
        references: &[EntityRef],
        channel: ChannelType,
    ) -> Result<HashSet<String>, StoreError> {
        let (persons, teams): (Vec<Uuid>, Vec<Uuid>) = references
            .iter()
            .filter_map(|reference| match reference.identity_kind() {
                Some(kind) => Some((kind, reference.id)),
                None => {
                    debug!(
                        id = %reference.id,
                        entity_type = %reference.entity_type,
                        "Reference is not a person or team, skipping"
                    );
                    None
                }
            })
            .partition_map(|(kind, id)| match kind {
                IdentityKind::Person => Either::Left(id),
                IdentityKind::Team => Either::Right(id),
            });

        let persons = self.load_all(IdentityKind::Person, &persons).await?;
        let teams = self.load_all(IdentityKind::Team, &teams).await?;
        let mut addresses = addresses_for(&persons, channel);
        addresses.extend(addresses_for(&teams, channel));
        Ok(addresses)
    }

    /// Loads identities concurrently, skipping the ones that no longer exist.
    async fn load_all(
        &self,
        kind: IdentityKind,
        ids: &[Uuid],
    ) -> Result<Vec<Identity>, StoreError> {
        let results = join_all(ids.iter().map(|id| self.identities.load(kind, *id))).await;
        let mut identities = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(identity) => identities.push(identity),
                Err(StoreError::NotFound { kind, id }) => {
                    warn!(%kind, %id, "Referenced identity not found, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(identities)
    }
}

/// Extracts the channel address of every identity that has one.
fn addresses_for(identities: &[Identity], channel: ChannelType) -> HashSet<String> {
    identities
        .iter()
        .filter_map(|identity| address_for(identity, channel))
        .collect()
}

fn address_for(identity: &Identity, channel: ChannelType) -> Option<String> {
    if channel.is_webhook() {
        return webhook_endpoint(identity.profile.as_ref(), identity.id, identity.kind, channel);
    }
    let email = identity
        .email
        .as_deref()
        .filter(|email| !email.trim().is_empty());
    if email.is_none() {
        debug!(id = %identity.id, kind = %identity.kind, "No email address, skipping");
    }
    email.map(str::to_string)
}

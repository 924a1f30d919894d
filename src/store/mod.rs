//! Storage collaborators.
//!
//! The resolver only depends on the [`IdentityStore`] and [`RelationshipStore`]
//! traits. [`InMemoryDirectory`] implements both over a serializable snapshot
//! and backs the command-line front end.

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::core::{
    Direction, EntityRef, Identity, IdentityKind, IdentityStore, Page, Relationship,
    RelationshipStore,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: IdentityKind, id: Uuid },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid pagination cursor '{0}'")]
    InvalidCursor(String),
}

/// A directed edge of the relationship graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub from: EntityRef,
    pub relationship: Relationship,
    pub to: EntityRef,
}

impl RelationshipRecord {
    pub fn new(from: EntityRef, relationship: Relationship, to: EntityRef) -> Self {
        Self {
            from,
            relationship,
            to,
        }
    }
}

/// The serializable contents of an [`InMemoryDirectory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

/// An in-memory identity and relationship store.
///
/// Admin listing is paginated over insertion order; the cursor is the offset
/// of the next identity.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    identities: Vec<Identity>,
    index: HashMap<(IdentityKind, Uuid), usize>,
    relationships: Vec<RelationshipRecord>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let mut directory = Self::new();
        for identity in snapshot.identities {
            directory.insert_identity(identity);
        }
        directory.relationships = snapshot.relationships;
        directory
    }

    /// Inserts an identity, replacing any previous one with the same kind and id.
    pub fn insert_identity(&mut self, identity: Identity) {
        let key = (identity.kind, identity.id);
        match self.index.get(&key) {
            Some(&position) => self.identities[position] = identity,
            None => {
                self.index.insert(key, self.identities.len());
                self.identities.push(identity);
            }
        }
    }

    pub fn relate(&mut self, from: EntityRef, relationship: Relationship, to: EntityRef) {
        self.relationships
            .push(RelationshipRecord::new(from, relationship, to));
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot {
            identities: self.identities.clone(),
            relationships: self.relationships.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryDirectory {
    async fn list_admins(
        &self,
        page_size: usize,
        after: Option<String>,
    ) -> Result<Page<Identity>, StoreError> {
        let offset = match after {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidCursor(cursor.clone()))?,
            None => 0,
        };

        let admins: Vec<&Identity> = self
            .identities
            .iter()
            .filter(|i| i.kind == IdentityKind::Person && i.is_admin)
            .collect();
        let data: Vec<Identity> = admins
            .iter()
            .skip(offset)
            .take(page_size.max(1))
            .map(|i| (*i).clone())
            .collect();

        let next = offset + data.len();
        let after = (next < admins.len()).then(|| next.to_string());
        Ok(Page { data, after })
    }

    async fn load(&self, kind: IdentityKind, id: Uuid) -> Result<Identity, StoreError> {
        self.index
            .get(&(kind, id))
            .map(|&position| self.identities[position].clone())
            .ok_or(StoreError::NotFound { kind, id })
    }
}

#[async_trait]
impl RelationshipStore for InMemoryDirectory {
    async fn find_related(
        &self,
        entity_id: Uuid,
        entity_type: &str,
        relationship: Relationship,
        direction: Direction,
    ) -> Result<Vec<EntityRef>, StoreError> {
        let related = self
            .relationships
            .iter()
            .filter(|r| r.relationship == relationship)
            .filter_map(|r| match direction {
                Direction::Incoming if r.to.id == entity_id && r.to.entity_type == entity_type => {
                    Some(r.from.clone())
                }
                Direction::Outgoing
                    if r.from.id == entity_id && r.from.entity_type == entity_type =>
                {
                    Some(r.to.clone())
                }
                _ => None,
            })
            .collect();
        Ok(related)
    }
}

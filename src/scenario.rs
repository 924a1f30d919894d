//! Scenario files for the command-line front end.
//!
//! A scenario bundles a directory snapshot with the action and event to
//! resolve, for example:
//!
//! ```json
//! {
//!   "identities": [
//!     { "id": "…", "kind": "person", "name": "alice", "email": "alice@example.com",
//!       "profile": { "subscription": {
//!         "slack": { "endpoint": "https://hooks.slack.com/…" } } } }
//!   ],
//!   "relationships": [
//!     { "from": { "id": "…", "type": "person" }, "relationship": "owns",
//!       "to": { "id": "…", "type": "table" } }
//!   ],
//!   "action": { "notifyOwners": true },
//!   "event": { "eventType": "entityUpdated", "entityType": "table", "entityId": "…" }
//! }
//! ```

use crate::core::{ChangeEvent, EntityRef, NotificationAction};
use crate::store::{DirectorySnapshot, InMemoryDirectory};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(flatten)]
    pub directory: DirectorySnapshot,
    #[serde(default)]
    pub action: NotificationAction,
    pub event: ChangeEvent,
    /// Assignees of the task the event belongs to, if any.
    #[serde(default)]
    pub task_assignees: Vec<EntityRef>,
    /// The subscription destination deliveries are recorded under.
    #[serde(default)]
    pub destination: Option<Uuid>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("invalid scenario {:?}", path))
    }

    /// Builds an in-memory directory holding the scenario's identities and relationships.
    pub fn directory(&self) -> InMemoryDirectory {
        InMemoryDirectory::from_snapshot(self.directory.clone())
    }
}

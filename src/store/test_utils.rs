use crate::{
    core::{
        Direction, EntityRef, Identity, IdentityKind, IdentityStore, Page, Relationship,
        RelationshipStore,
    },
    store::{InMemoryDirectory, StoreError},
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A store that is down: every call fails with `StoreError::Unavailable`.
#[derive(Debug, Default)]
pub struct UnavailableStore {
    calls: AtomicUsize,
}

impl UnavailableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of calls made against the store
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl IdentityStore for UnavailableStore {
    async fn list_admins(
        &self,
        _page_size: usize,
        _after: Option<String>,
    ) -> Result<Page<Identity>, StoreError> {
        self.fail()
    }

    async fn load(&self, _kind: IdentityKind, _id: Uuid) -> Result<Identity, StoreError> {
        self.fail()
    }
}

#[async_trait]
impl RelationshipStore for UnavailableStore {
    async fn find_related(
        &self,
        _entity_id: Uuid,
        _entity_type: &str,
        _relationship: Relationship,
        _direction: Direction,
    ) -> Result<Vec<EntityRef>, StoreError> {
        self.fail()
    }
}

/// Identity store that serves a fixed queue of admin pages.
///
/// The front of the queue is the next page. Loads are delegated to an inner
/// directory.
#[derive(Default)]
pub struct ScriptedAdminStore {
    pages: Mutex<VecDeque<Result<Page<Identity>, StoreError>>>,
    cursors: Mutex<Vec<Option<String>>>,
    directory: InMemoryDirectory,
}

impl ScriptedAdminStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page of admins, followed by `after` as the continuation cursor
    pub fn add_page(&self, data: Vec<Identity>, after: Option<&str>) {
        self.pages.lock().unwrap().push_back(Ok(Page {
            data,
            after: after.map(str::to_string),
        }));
    }

    /// Queue a failing page
    pub fn add_error(&self, error: StoreError) {
        self.pages.lock().unwrap().push_back(Err(error));
    }

    /// The cursors the store was called with, in order
    pub fn requested_cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityStore for ScriptedAdminStore {
    async fn list_admins(
        &self,
        _page_size: usize,
        after: Option<String>,
    ) -> Result<Page<Identity>, StoreError> {
        self.cursors.lock().unwrap().push(after);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StoreError::Unavailable("no more pages scripted".to_string())))
    }

    async fn load(&self, kind: IdentityKind, id: Uuid) -> Result<Identity, StoreError> {
        self.directory.load(kind, id).await
    }
}

/// Relationship store that fails for selected relationship kinds and serves
/// the rest from an inner directory.
pub struct FlakyRelationshipStore {
    inner: Arc<InMemoryDirectory>,
    failing: HashSet<Relationship>,
}

impl FlakyRelationshipStore {
    pub fn new(inner: Arc<InMemoryDirectory>) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, relationship: Relationship) -> Self {
        self.failing.insert(relationship);
        self
    }
}

#[async_trait]
impl RelationshipStore for FlakyRelationshipStore {
    async fn find_related(
        &self,
        entity_id: Uuid,
        entity_type: &str,
        relationship: Relationship,
        direction: Direction,
    ) -> Result<Vec<EntityRef>, StoreError> {
        if self.failing.contains(&relationship) {
            return Err(StoreError::Unavailable(format!(
                "simulated failure listing '{relationship}' relations"
            )));
        }
        self.inner
            .find_related(entity_id, entity_type, relationship, direction)
            .await
    }
}

//! The remote document store seam.
//!
//! [`RemoteFeatureStore`] abstracts the persistence service reached over
//! request/response calls. The workspace only ever talks to this trait; the
//! `PostgreSQL` implementation lives in `cartograph-db`, and
//! [`MemoryRemote`] serves tests and database-less deployments.
//!
//! Records carry the version they were written with. Implementations must
//! apply an update or delete only when its version is at least as new as the
//! stored one, so a late write can never clobber a newer one.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use cartograph_types::{FeatureRecord, GeometryKind, RecordDraft, RemoteId, UserId};
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::debug;

/// Errors reported by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The referenced record does not exist.
    #[error("remote record not found: {0}")]
    NotFound(RemoteId),

    /// The backend rejected or failed the request.
    #[error("remote store backend error: {0}")]
    Backend(String),
}

/// A remote persistence service for features.
pub trait RemoteFeatureStore: Send + Sync + 'static {
    /// Fetch every record owned by `owner` with the given geometry kind.
    fn load(
        &self,
        owner: &UserId,
        kind: GeometryKind,
    ) -> impl Future<Output = Result<Vec<FeatureRecord>, RemoteError>> + Send;

    /// Insert a new record and return its id.
    fn create(
        &self,
        draft: RecordDraft,
    ) -> impl Future<Output = Result<RemoteId, RemoteError>> + Send;

    /// Overwrite a record of `draft.owner_id` if `draft.version` is newer
    /// than the stored one. Stale updates succeed without effect; a record
    /// owned by someone else is reported as not found.
    fn update(
        &self,
        id: &RemoteId,
        draft: RecordDraft,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove a record of `owner` unless it was written with a version
    /// newer than `version`. Deleting an absent record, or one owned by
    /// someone else, succeeds without effect.
    fn delete(
        &self,
        id: &RemoteId,
        owner: &UserId,
        version: u64,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Which remote call a held request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    /// [`RemoteFeatureStore::load`].
    Load,
    /// [`RemoteFeatureStore::create`].
    Create,
    /// [`RemoteFeatureStore::update`].
    Update,
    /// [`RemoteFeatureStore::delete`].
    Delete,
}

/// A request parked by a gated [`MemoryRemote`].
#[derive(Debug)]
struct HeldRequest {
    call: RemoteCall,
    version: u64,
    release: oneshot::Sender<()>,
}

/// An in-memory remote store.
///
/// When gated, every request parks until a test releases it, which makes
/// completion order fully controllable.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    /// Stored records by id.
    records: Mutex<BTreeMap<RemoteId, FeatureRecord>>,
    /// Parked requests in arrival order.
    held: Mutex<Vec<HeldRequest>>,
    /// Signalled whenever a request is parked.
    held_changed: Notify,
    /// Whether new requests are parked.
    gated: AtomicBool,
    /// Whether writes fail with [`RemoteError::Unavailable`].
    fail_writes: AtomicBool,
    /// Whether loads fail with [`RemoteError::Unavailable`].
    fail_loads: AtomicBool,
}

impl MemoryRemote {
    /// Create an empty, ungated store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park new requests until released.
    pub fn set_gated(&self, gated: bool) {
        self.gated.store(gated, Ordering::Release);
    }

    /// Make writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Make loads fail.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::Release);
    }

    /// Insert a record directly, bypassing the gate.
    pub async fn seed(&self, record: FeatureRecord) {
        self.records.lock().await.insert(record.id.clone(), record);
    }

    /// Snapshot of every stored record.
    pub async fn records(&self) -> Vec<FeatureRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    /// Look up a stored record.
    pub async fn record(&self, id: &RemoteId) -> Option<FeatureRecord> {
        self.records.lock().await.get(id).cloned()
    }

    /// Number of parked requests.
    pub async fn held_count(&self) -> usize {
        self.held.lock().await.len()
    }

    /// Wait until at least `count` requests are parked.
    pub async fn wait_held(&self, count: usize) {
        loop {
            let changed = self.held_changed.notified();
            if self.held.lock().await.len() >= count {
                return;
            }
            changed.await;
        }
    }

    /// Release the oldest parked request matching `call` and `version`.
    /// Returns whether one was found.
    pub async fn release(&self, call: RemoteCall, version: u64) -> bool {
        let mut held = self.held.lock().await;
        let Some(position) = held
            .iter()
            .position(|request| request.call == call && request.version == version)
        else {
            return false;
        };
        let request = held.remove(position);
        request.release.send(()).is_ok()
    }

    /// Release every parked request in arrival order.
    pub async fn release_all(&self) -> usize {
        let held: Vec<HeldRequest> = std::mem::take(&mut *self.held.lock().await);
        let count = held.len();
        for request in held {
            let _ = request.release.send(());
        }
        count
    }

    async fn pass_gate(&self, call: RemoteCall, version: u64) {
        if !self.gated.load(Ordering::Acquire) {
            return;
        }
        let (release, parked) = oneshot::channel();
        self.held.lock().await.push(HeldRequest {
            call,
            version,
            release,
        });
        self.held_changed.notify_waiters();
        debug!(?call, version, "Request parked");
        // A dropped sender (store torn down) releases the request too.
        let _ = parked.await;
    }

    fn check_writes(&self) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(RemoteError::Unavailable(String::from("writes disabled")));
        }
        Ok(())
    }
}

impl RemoteFeatureStore for MemoryRemote {
    async fn load(
        &self,
        owner: &UserId,
        kind: GeometryKind,
    ) -> Result<Vec<FeatureRecord>, RemoteError> {
        self.pass_gate(RemoteCall::Load, 0).await;
        if self.fail_loads.load(Ordering::Acquire) {
            return Err(RemoteError::Unavailable(String::from("loads disabled")));
        }
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|record| record.owner_id == *owner && record.kind == kind)
            .cloned()
            .collect())
    }

    async fn create(&self, draft: RecordDraft) -> Result<RemoteId, RemoteError> {
        self.pass_gate(RemoteCall::Create, draft.version).await;
        self.check_writes()?;
        let id = RemoteId::new(uuid::Uuid::now_v7().to_string());
        self.records
            .lock()
            .await
            .insert(id.clone(), FeatureRecord::from_draft(id.clone(), draft));
        Ok(id)
    }

    async fn update(&self, id: &RemoteId, draft: RecordDraft) -> Result<(), RemoteError> {
        self.pass_gate(RemoteCall::Update, draft.version).await;
        self.check_writes()?;
        let mut records = self.records.lock().await;
        let stored = records
            .get_mut(id)
            .filter(|stored| stored.owner_id == draft.owner_id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        if draft.version <= stored.version {
            debug!(record = %id, version = draft.version, stored = stored.version, "Stale update ignored");
            return Ok(());
        }
        *stored = FeatureRecord::from_draft(id.clone(), draft);
        Ok(())
    }

    async fn delete(&self, id: &RemoteId, owner: &UserId, version: u64) -> Result<(), RemoteError> {
        self.pass_gate(RemoteCall::Delete, version).await;
        self.check_writes()?;
        let mut records = self.records.lock().await;
        if records
            .get(id)
            .is_some_and(|stored| stored.owner_id == *owner && stored.version <= version)
        {
            records.remove(id);
        }
        Ok(())
    }
}

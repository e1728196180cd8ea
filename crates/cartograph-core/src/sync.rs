//! Write-through synchronization between a feature store and the remote
//! store.
//!
//! [`PersistenceSync`] is pure bookkeeping. It turns local store changes
//! into [`WriteRequest`]s and applies [`WriteCompletion`]s; the workspace
//! issues the actual remote calls. Keeping the state machine free of I/O
//! makes every ordering case testable without a runtime.
//!
//! # Ordering
//!
//! Each write is tagged with the feature version that produced it. Per
//! feature the sync tracks the highest version issued and the highest
//! version applied. A completion older than the last applied one is
//! discarded, so the outcome is last-writer-by-version, not
//! last-response.
//!
//! # Sessions
//!
//! Every activation and sign-out bumps a generation counter. Completions
//! and loads carry the generation they were issued under; anything from an
//! older generation is dropped on arrival.

use std::collections::BTreeMap;

use cartograph_types::{
    Feature, FeatureId, FeatureRecord, RecordDraft, RemoteId, StoreChange, UserId,
};
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::WorkspaceError;
use crate::geometry::{GeometryEngine, normalize};
use crate::remote::RemoteError;
use crate::store::FeatureStore;

/// A remote write the workspace must issue.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Insert a new record.
    Create {
        /// The local feature.
        feature: FeatureId,
        /// Record body.
        draft: RecordDraft,
    },
    /// Overwrite an existing record.
    Update {
        /// The local feature.
        feature: FeatureId,
        /// The record to overwrite.
        remote_id: RemoteId,
        /// Record body.
        draft: RecordDraft,
    },
    /// Remove a record.
    Delete {
        /// The local feature.
        feature: FeatureId,
        /// The record to remove.
        remote_id: RemoteId,
        /// Owner the record must belong to.
        owner: UserId,
        /// Version of the deletion.
        version: u64,
    },
}

impl WriteRequest {
    /// The local feature this write is for.
    pub const fn feature(&self) -> &FeatureId {
        match self {
            Self::Create { feature, .. }
            | Self::Update { feature, .. }
            | Self::Delete { feature, .. } => feature,
        }
    }

    /// The version this write carries.
    pub const fn version(&self) -> u64 {
        match self {
            Self::Create { draft, .. } | Self::Update { draft, .. } => draft.version,
            Self::Delete { version, .. } => *version,
        }
    }
}

/// Result of a remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Result of a create.
    Created(Result<RemoteId, RemoteError>),
    /// Result of an update.
    Updated(Result<(), RemoteError>),
    /// Result of a delete.
    Deleted(Result<(), RemoteError>),
}

/// A finished remote write, tagged for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCompletion {
    /// Session generation the write was issued under.
    pub generation: u64,
    /// The local feature.
    pub feature: FeatureId,
    /// Version the write carried.
    pub version: u64,
    /// What happened.
    pub outcome: WriteOutcome,
}

/// What applying a completion produced.
#[derive(Debug, Default)]
pub struct CompletionEffect {
    /// Follow-up writes to issue.
    pub writes: Vec<WriteRequest>,
    /// A failure to report to the user.
    pub error: Option<WorkspaceError>,
}

/// Per-feature write bookkeeping.
#[derive(Debug, Clone, Default)]
struct SyncSlot {
    /// Remote record id, once known.
    remote_id: Option<RemoteId>,
    /// Highest version issued.
    issued: u64,
    /// Highest version whose completion was applied.
    applied: u64,
    /// A create is in flight.
    creating: bool,
    /// The feature changed while its create was in flight.
    dirty: bool,
    /// The feature was deleted while its create was in flight, at this
    /// version.
    deleted: Option<u64>,
    /// A feature with the same id was created again after the deletion.
    /// Its create waits until the old record is resolved.
    recreated: bool,
}

/// Bidirectional synchronizer between a feature store and a remote store.
#[derive(Debug, Default)]
pub struct PersistenceSync {
    /// The signed-in user, if any.
    owner: Option<UserId>,
    /// Session generation.
    generation: u64,
    /// Write bookkeeping per feature.
    slots: BTreeMap<FeatureId, SyncSlot>,
}

impl PersistenceSync {
    /// Create an inactive synchronizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `owner`. Returns the new generation.
    pub fn activate(&mut self, owner: UserId) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        info!(user = %owner, generation = self.generation, "Sync session started");
        self.owner = Some(owner);
        self.slots.clear();
        self.generation
    }

    /// End the session. Outstanding completions become stale.
    pub fn deactivate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(owner) = self.owner.take() {
            info!(user = %owner, generation = self.generation, "Sync session ended");
        }
        self.slots.clear();
    }

    /// The current session generation.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The signed-in user.
    pub const fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// Whether writes go to the remote store.
    pub const fn is_active(&self) -> bool {
        self.owner.is_some()
    }

    /// The remote record id known for a feature.
    pub fn remote_id(&self, feature: &FeatureId) -> Option<&RemoteId> {
        self.slots.get(feature).and_then(|slot| slot.remote_id.as_ref())
    }

    // -------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------

    /// Turn loaded records into features for the current owner.
    ///
    /// Records owned by someone else and records whose coordinates cannot
    /// be decoded are skipped with a warning.
    pub fn features_from_records(&self, records: Vec<FeatureRecord>) -> Vec<Feature> {
        let Some(owner) = self.owner.as_ref() else {
            return Vec::new();
        };
        records
            .into_iter()
            .filter_map(|record| {
                if record.owner_id != *owner {
                    warn!(record = %record.id, "Dropping record owned by another user");
                    return None;
                }
                let geometry = codec::decode(record.kind, &record.coordinates)
                    .map_err(|err| err.to_string())
                    .and_then(|geometry| normalize(geometry).map_err(|err| err.to_string()));
                match geometry {
                    Ok(geometry) => Some(Feature {
                        id: FeatureId::from(record.id.clone()),
                        name: record.name,
                        derived: GeometryEngine::measure(&geometry),
                        geometry,
                        owner_id: Some(record.owner_id),
                        remote_id: Some(record.id),
                        version: record.version,
                        synced_version: record.version,
                    }),
                    Err(reason) => {
                        warn!(record = %record.id, %reason, "Dropping record with unreadable coordinates");
                        None
                    }
                }
            })
            .collect()
    }

    // -------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------

    /// React to a store change. Returns the remote write it requires, if
    /// any.
    pub fn on_change(&mut self, change: &StoreChange) -> Option<WriteRequest> {
        match change {
            StoreChange::Loaded { features } => {
                for feature in features {
                    self.slots.insert(
                        feature.id.clone(),
                        SyncSlot {
                            remote_id: feature.remote_id.clone(),
                            issued: feature.version,
                            applied: feature.version,
                            ..SyncSlot::default()
                        },
                    );
                }
                None
            }
            StoreChange::Cleared { .. } => {
                self.slots.clear();
                None
            }
            StoreChange::Synced { .. } => None,
            StoreChange::Created { feature } | StoreChange::Updated { feature } => {
                self.on_written(feature)
            }
            StoreChange::Deleted { feature } => self.on_deleted(feature),
        }
    }

    fn on_written(&mut self, feature: &Feature) -> Option<WriteRequest> {
        let owner = self.owner.clone()?;
        let slot = self.slots.entry(feature.id.clone()).or_default();
        if slot.deleted.is_some() {
            debug!(feature = %feature.id, version = feature.version, "Create queued behind pending delete");
            slot.recreated = true;
            return None;
        }
        if feature.version <= slot.issued {
            debug!(feature = %feature.id, version = feature.version, "Version already issued");
            return None;
        }

        if slot.creating {
            slot.dirty = true;
            return None;
        }
        let draft = match codec::to_draft(feature, &owner) {
            Ok(draft) => draft,
            Err(err) => {
                warn!(feature = %feature.id, error = %err, "Cannot encode feature");
                return None;
            }
        };
        slot.issued = feature.version;

        if let Some(remote_id) = slot.remote_id.clone() {
            Some(WriteRequest::Update {
                feature: feature.id.clone(),
                remote_id,
                draft,
            })
        } else {
            // First write, or a retry after a failed create.
            slot.creating = true;
            Some(WriteRequest::Create {
                feature: feature.id.clone(),
                draft,
            })
        }
    }

    fn on_deleted(&mut self, feature: &Feature) -> Option<WriteRequest> {
        let owner = self.owner.clone()?;
        let slot = self.slots.get_mut(&feature.id)?;
        if slot.creating {
            if slot.deleted.is_some() {
                // The queued incarnation never reached the remote store.
                slot.recreated = false;
            } else {
                slot.deleted = Some(feature.version);
            }
            return None;
        }
        let slot = self.slots.remove(&feature.id)?;
        slot.remote_id.map(|remote_id| WriteRequest::Delete {
            feature: feature.id.clone(),
            remote_id,
            owner,
            version: feature.version,
        })
    }

    // -------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------

    /// Apply a finished remote write.
    pub fn on_completion(
        &mut self,
        store: &mut FeatureStore,
        completion: WriteCompletion,
    ) -> CompletionEffect {
        let mut effect = CompletionEffect::default();
        if completion.generation != self.generation {
            debug!(feature = %completion.feature, "Completion from an ended session discarded");
            return effect;
        }
        let WriteCompletion {
            feature,
            version,
            outcome,
            ..
        } = completion;

        match outcome {
            WriteOutcome::Created(result) => {
                self.on_created(store, &feature, version, result, &mut effect);
            }
            WriteOutcome::Updated(Ok(())) => {
                let Some(slot) = self.slots.get_mut(&feature) else {
                    return effect;
                };
                if version <= slot.applied {
                    debug!(feature = %feature, version, applied = slot.applied, "Stale completion discarded");
                    return effect;
                }
                slot.applied = version;
                store.acknowledge(&feature, None, version);
            }
            WriteOutcome::Updated(Err(source)) => {
                let stale = self
                    .slots
                    .get(&feature)
                    .is_none_or(|slot| version <= slot.applied);
                if stale {
                    debug!(feature = %feature, version, "Stale failure discarded");
                } else {
                    effect.error = Some(WorkspaceError::RemoteWriteFailed { feature, source });
                }
            }
            WriteOutcome::Deleted(Ok(())) => {
                debug!(feature = %feature, "Remote record deleted");
            }
            WriteOutcome::Deleted(Err(source)) => {
                effect.error = Some(WorkspaceError::RemoteWriteFailed { feature, source });
            }
        }
        effect
    }

    fn on_created(
        &mut self,
        store: &mut FeatureStore,
        feature: &FeatureId,
        version: u64,
        result: Result<RemoteId, RemoteError>,
        effect: &mut CompletionEffect,
    ) {
        let Some(slot) = self.slots.get_mut(feature) else {
            return;
        };
        slot.creating = false;
        let dirty = std::mem::take(&mut slot.dirty);

        if let Some(deleted_at) = slot.deleted {
            let recreated = slot.recreated;
            self.slots.remove(feature);
            match (result, self.owner.clone()) {
                (Ok(remote_id), Some(owner)) => effect.writes.push(WriteRequest::Delete {
                    feature: feature.clone(),
                    remote_id,
                    owner,
                    version: deleted_at,
                }),
                (Ok(_), None) => {}
                (Err(source), _) => {
                    effect.error = Some(WorkspaceError::RemoteWriteFailed {
                        feature: feature.clone(),
                        source,
                    });
                }
            }
            if recreated {
                effect.writes.extend(self.restart_create(store, feature));
            }
            return;
        }

        let remote_id = match result {
            Ok(remote_id) => remote_id,
            Err(source) => {
                effect.error = Some(WorkspaceError::RemoteWriteFailed {
                    feature: feature.clone(),
                    source,
                });
                return;
            }
        };

        slot.remote_id = Some(remote_id.clone());
        slot.applied = slot.applied.max(version);

        let Some(current) = store.acknowledge(feature, Some(remote_id.clone()), version) else {
            return;
        };
        if !dirty || current.version <= slot.issued {
            return;
        }
        let Some(owner) = self.owner.as_ref() else {
            return;
        };
        match codec::to_draft(&current, owner) {
            Ok(draft) => {
                slot.issued = current.version;
                effect.writes.push(WriteRequest::Update {
                    feature: feature.clone(),
                    remote_id,
                    draft,
                });
            }
            Err(err) => warn!(feature = %feature, error = %err, "Cannot encode feature"),
        }
    }

    /// Issue a create for the feature currently stored under `feature`,
    /// starting fresh bookkeeping for it.
    fn restart_create(&mut self, store: &FeatureStore, feature: &FeatureId) -> Option<WriteRequest> {
        let current = store.get(feature)?;
        let owner = self.owner.as_ref()?;
        let draft = match codec::to_draft(current, owner) {
            Ok(draft) => draft,
            Err(err) => {
                warn!(feature = %feature, error = %err, "Cannot encode feature");
                return None;
            }
        };
        self.slots.insert(
            feature.clone(),
            SyncSlot {
                issued: current.version,
                creating: true,
                ..SyncSlot::default()
            },
        );
        Some(WriteRequest::Create {
            feature: feature.clone(),
            draft,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartograph_types::{
        Coordinate, FeaturePatch, Geometry, GeometryKind, NewFeature, WorkspaceKind,
    };

    use super::*;
    use crate::store::DEFAULT_CHANGE_CAPACITY;

    fn marker_store() -> FeatureStore {
        FeatureStore::new(WorkspaceKind::MarkerSet, DEFAULT_CHANGE_CAPACITY)
    }

    fn point(x: f64) -> Geometry {
        Geometry::Point(Coordinate::new(x, 0.0))
    }

    fn active_sync() -> PersistenceSync {
        let mut sync = PersistenceSync::new();
        sync.activate(UserId::from("alice"));
        sync
    }

    fn completion(sync: &PersistenceSync, id: &str, version: u64, outcome: WriteOutcome) -> WriteCompletion {
        WriteCompletion {
            generation: sync.generation(),
            feature: FeatureId::from(id),
            version,
            outcome,
        }
    }

    fn created_change(store: &mut FeatureStore, id: &str) -> StoreChange {
        let feature = store.create(NewFeature::from_geometry(point(1.0)).with_id(FeatureId::from(id)));
        StoreChange::Created { feature: feature.unwrap() }
    }

    fn updated_change(store: &mut FeatureStore, id: &str, x: f64) -> StoreChange {
        let feature = store.update(&FeatureId::from(id), FeaturePatch::geometry(point(x)));
        StoreChange::Updated { feature: feature.unwrap() }
    }

    #[test]
    fn inactive_sync_issues_nothing() {
        let mut sync = PersistenceSync::new();
        let mut store = marker_store();
        let change = created_change(&mut store, "m");
        assert_eq!(sync.on_change(&change), None);
    }

    #[test]
    fn create_then_update_uses_remote_id() {
        let mut sync = active_sync();
        let mut store = marker_store();

        let create = sync.on_change(&created_change(&mut store, "m"));
        assert!(matches!(create, Some(WriteRequest::Create { ref draft, .. }) if draft.version == 1));

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        assert!(effect.writes.is_empty());
        assert!(store.get(&FeatureId::from("m")).is_some_and(|f| f.remote_id == Some(RemoteId::from("r1")) && f.synced_version == 1));

        let update = sync.on_change(&updated_change(&mut store, "m", 2.0));
        assert!(matches!(
            update,
            Some(WriteRequest::Update { ref remote_id, ref draft, .. })
                if *remote_id == RemoteId::from("r1") && draft.version == 2
        ));
    }

    #[test]
    fn out_of_order_update_completions_keep_newest() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let _ = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        let v2 = sync.on_change(&updated_change(&mut store, "m", 2.0));
        let v3 = sync.on_change(&updated_change(&mut store, "m", 3.0));
        assert_eq!(v2.map(|w| w.version()), Some(2));
        assert_eq!(v3.map(|w| w.version()), Some(3));

        let _ = sync.on_completion(&mut store, completion(&sync, "m", 3, WriteOutcome::Updated(Ok(()))));
        let late = sync.on_completion(
            &mut store,
            completion(&sync, "m", 2, WriteOutcome::Updated(Err(RemoteError::Backend(String::from("late"))))),
        );
        assert!(late.error.is_none());
        assert!(store.get(&FeatureId::from("m")).is_some_and(|f| f.synced_version == 3 && f.version == 3));
    }

    #[test]
    fn update_during_create_is_flushed_after() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        assert_eq!(sync.on_change(&updated_change(&mut store, "m", 5.0)), None);

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        assert!(matches!(
            effect.writes.first(),
            Some(WriteRequest::Update { draft, .. }) if draft.version == 2 && draft.coordinates == "[5.0,0.0]"
        ));
    }

    #[test]
    fn delete_during_create_deletes_after() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let removed = store.delete(&FeatureId::from("m"));
        let change = StoreChange::Deleted { feature: removed.unwrap() };
        assert_eq!(sync.on_change(&change), None);

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        assert!(matches!(
            effect.writes.first(),
            Some(WriteRequest::Delete { remote_id, owner, version: 2, .. })
                if *remote_id == RemoteId::from("r1") && *owner == UserId::from("alice")
        ));
        assert!(sync.remote_id(&FeatureId::from("m")).is_none());
    }

    #[test]
    fn recreate_during_create_waits_for_old_record() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let id = FeatureId::from("m");
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let removed = store.delete(&id).unwrap();
        assert_eq!(sync.on_change(&StoreChange::Deleted { feature: removed }), None);
        assert_eq!(sync.on_change(&created_change(&mut store, "m")), None);
        assert_eq!(sync.on_change(&updated_change(&mut store, "m", 6.0)), None);

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        assert!(effect.error.is_none());
        assert!(matches!(
            effect.writes.as_slice(),
            [
                WriteRequest::Delete { remote_id, version: 2, .. },
                WriteRequest::Create { draft, .. },
            ] if *remote_id == RemoteId::from("r1")
                && draft.version == 2
                && draft.coordinates == "[6.0,0.0]"
        ));
        // The old record's id never leaks onto the new feature.
        assert!(store.get(&id).is_some_and(|f| f.remote_id.is_none()));

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 2, WriteOutcome::Created(Ok(RemoteId::from("r2")))),
        );
        assert!(effect.writes.is_empty());
        assert_eq!(sync.remote_id(&id), Some(&RemoteId::from("r2")));
        assert!(store.get(&id).is_some_and(|f| f.remote_id == Some(RemoteId::from("r2")) && f.synced_version == 2));
    }

    #[test]
    fn recreate_after_failed_create_is_still_written() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let removed = store.delete(&FeatureId::from("m")).unwrap();
        let _ = sync.on_change(&StoreChange::Deleted { feature: removed });
        let _ = sync.on_change(&created_change(&mut store, "m"));

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Err(RemoteError::Unavailable(String::from("down"))))),
        );
        assert!(matches!(effect.error, Some(WorkspaceError::RemoteWriteFailed { .. })));
        assert!(matches!(effect.writes.as_slice(), [WriteRequest::Create { draft, .. }] if draft.version == 1));
    }

    #[test]
    fn recreated_then_deleted_again_only_removes_old_record() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let id = FeatureId::from("m");
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let removed = store.delete(&id).unwrap();
        let _ = sync.on_change(&StoreChange::Deleted { feature: removed });
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let removed = store.delete(&id).unwrap();
        assert_eq!(sync.on_change(&StoreChange::Deleted { feature: removed }), None);

        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        assert!(matches!(
            effect.writes.as_slice(),
            [WriteRequest::Delete { remote_id, version: 2, .. }] if *remote_id == RemoteId::from("r1")
        ));
        assert!(sync.remote_id(&id).is_none());
    }

    #[test]
    fn acknowledgements_and_loads_issue_no_writes() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let _ = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1")))),
        );
        let feature = store.get(&FeatureId::from("m")).cloned().unwrap();

        assert_eq!(sync.on_change(&StoreChange::Synced { feature: feature.clone() }), None);
        assert_eq!(sync.on_change(&StoreChange::Loaded { features: vec![feature] }), None);
        assert_eq!(
            sync.on_change(&StoreChange::Cleared { removed: vec![FeatureId::from("m")] }),
            None
        );
        assert!(sync.remote_id(&FeatureId::from("m")).is_none());
    }

    #[test]
    fn failed_create_is_retried_on_next_mutation() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let effect = sync.on_completion(
            &mut store,
            completion(&sync, "m", 1, WriteOutcome::Created(Err(RemoteError::Unavailable(String::from("down"))))),
        );
        assert!(matches!(effect.error, Some(WorkspaceError::RemoteWriteFailed { .. })));
        assert!(store.contains(&FeatureId::from("m")));

        let retry = sync.on_change(&updated_change(&mut store, "m", 2.0));
        assert!(matches!(retry, Some(WriteRequest::Create { ref draft, .. }) if draft.version == 2));
    }

    #[test]
    fn completions_from_ended_session_are_discarded() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let _ = sync.on_change(&created_change(&mut store, "m"));
        let stale = completion(&sync, "m", 1, WriteOutcome::Created(Ok(RemoteId::from("r1"))));
        sync.deactivate();
        sync.activate(UserId::from("alice"));

        let effect = sync.on_completion(&mut store, stale);
        assert!(effect.writes.is_empty() && effect.error.is_none());
        assert!(store.get(&FeatureId::from("m")).is_some_and(|f| f.remote_id.is_none()));
    }

    #[test]
    fn foreign_and_unreadable_records_are_dropped() {
        let sync = active_sync();
        let record = |id: &str, owner: &str, coordinates: &str| FeatureRecord {
            id: RemoteId::from(id),
            owner_id: UserId::from(owner),
            kind: GeometryKind::Point,
            name: String::from(id),
            size: 0.0,
            coordinates: String::from(coordinates),
            version: 7,
        };
        let features = sync.features_from_records(vec![
            record("mine", "alice", "[1.0,2.0]"),
            record("theirs", "bob", "[1.0,2.0]"),
            record("broken", "alice", "[1.0"),
        ]);
        assert_eq!(features.len(), 1);
        assert!(features.first().is_some_and(|f| f.id == FeatureId::from("mine")
            && f.remote_id == Some(RemoteId::from("mine"))
            && f.version == 7
            && f.synced_version == 7));
    }

    #[test]
    fn loaded_features_update_by_remote_id() {
        let mut sync = active_sync();
        let mut store = marker_store();
        let features = sync.features_from_records(vec![FeatureRecord {
            id: RemoteId::from("r9"),
            owner_id: UserId::from("alice"),
            kind: GeometryKind::Point,
            name: String::from("Home"),
            size: 0.0,
            coordinates: String::from("[1.0,2.0]"),
            version: 4,
        }]);
        store.hydrate(features.clone());
        let _ = sync.on_change(&StoreChange::Loaded { features });

        let update = sync.on_change(&updated_change(&mut store, "r9", 9.0));
        assert!(matches!(
            update,
            Some(WriteRequest::Update { ref remote_id, ref draft, .. })
                if *remote_id == RemoteId::from("r9") && draft.version == 5
        ));
    }
}

//! The authoritative in-memory feature collection of one workspace.
//!
//! [`FeatureStore`] is the single choke point for feature mutation. Every
//! create, update, and delete goes through it, so it is the one place that
//! enforces:
//!
//! - unique feature ids,
//! - derived measurements consistent with the current geometry,
//! - geometry kinds that belong to the workspace kind,
//! - a version bump per mutation.
//!
//! Every mutation publishes a [`StoreChange`] on a broadcast channel.
//! Observers (persistence sync, the render-surface adapter, UI clients)
//! subscribe once and unsubscribe by dropping their receiver.

use std::collections::BTreeMap;

use cartograph_types::{
    Feature, FeatureId, FeaturePatch, NewFeature, RemoteId, StoreChange, UserId,
    WorkspaceKind,
};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{ValidationError, WorkspaceError};
use crate::geometry::{GeometryEngine, normalize};

/// Default capacity of the change notification channel.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// In-memory authoritative collection of features for one workspace kind.
#[derive(Debug)]
pub struct FeatureStore {
    /// The workspace kind this store serves.
    kind: WorkspaceKind,
    /// Features indexed by id.
    features: BTreeMap<FeatureId, Feature>,
    /// Insertion order, for stable UI ordering.
    order: Vec<FeatureId>,
    /// Owner stamped onto new features while a session is active.
    owner: Option<UserId>,
    /// Whether the initial remote load is outstanding.
    loading: bool,
    /// Change notification sender.
    tx: broadcast::Sender<StoreChange>,
}

impl FeatureStore {
    /// Create an empty store for the given workspace kind.
    pub fn new(kind: WorkspaceKind, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            kind,
            features: BTreeMap::new(),
            order: Vec::new(),
            owner: None,
            loading: false,
            tx,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }

    /// A handle to the change channel, for subscribing from other tasks.
    pub fn sender(&self) -> broadcast::Sender<StoreChange> {
        self.tx.clone()
    }

    /// The workspace kind this store serves.
    pub const fn kind(&self) -> WorkspaceKind {
        self.kind
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the store holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Look up a feature by id.
    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.get(id)
    }

    /// Whether a feature with this id exists.
    pub fn contains(&self, id: &FeatureId) -> bool {
        self.features.contains_key(id)
    }

    /// Snapshot of all features in insertion order.
    pub fn list(&self) -> Vec<Feature> {
        self.order
            .iter()
            .filter_map(|id| self.features.get(id))
            .cloned()
            .collect()
    }

    /// Whether the initial remote load is outstanding.
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Mark the initial remote load as outstanding or finished.
    pub const fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Owner stamped onto new features.
    pub const fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// Set the owner stamped onto new features.
    pub fn set_owner(&mut self, owner: Option<UserId>) {
        self.owner = owner;
    }

    /// The default label for the next feature: `Untitled N` where `N` is
    /// one more than the current feature count.
    pub fn default_name(&self) -> String {
        format!("Untitled {}", self.features.len().saturating_add(1))
    }

    // -------------------------------------------------------------------
    // CRUD
    // -------------------------------------------------------------------

    /// Insert a new feature, assigning an id and name if absent and
    /// computing its derived fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the geometry is incomplete, has the
    /// wrong kind for this workspace, or the id is already taken.
    pub fn create(&mut self, new: NewFeature) -> Result<Feature, WorkspaceError> {
        self.check_kind(&new.geometry)?;
        let geometry = normalize(new.geometry)?;
        let id = new.id.unwrap_or_else(FeatureId::generate);
        if self.features.contains_key(&id) {
            return Err(ValidationError::DuplicateId(id).into());
        }

        let feature = Feature {
            name: new.name.unwrap_or_else(|| self.default_name()),
            derived: GeometryEngine::measure(&geometry),
            geometry,
            owner_id: self.owner.clone(),
            remote_id: None,
            version: 1,
            synced_version: 0,
            id: id.clone(),
        };

        self.features.insert(id.clone(), feature.clone());
        self.order.push(id);
        self.publish(StoreChange::Created { feature: feature.clone() });
        Ok(feature)
    }

    /// Merge a patch into an existing feature, recomputing derived fields
    /// when the geometry changes.
    ///
    /// A patch that changes nothing returns the feature untouched and
    /// publishes no notification.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NotFound`] if the id is absent, or a
    /// [`ValidationError`] if the new geometry is invalid.
    pub fn update(&mut self, id: &FeatureId, patch: FeaturePatch) -> Result<Feature, WorkspaceError> {
        let current = self
            .features
            .get(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;

        let geometry = match patch.geometry {
            Some(geometry) => {
                if geometry.kind() != current.geometry.kind() {
                    return Err(ValidationError::WrongKind {
                        workspace: self.kind,
                        kind: geometry.kind(),
                    }
                    .into());
                }
                Some(normalize(geometry)?)
            }
            None => None,
        };

        let rename = patch.name.filter(|name| *name != current.name);
        let reshape = geometry.filter(|geometry| *geometry != current.geometry);
        if rename.is_none() && reshape.is_none() {
            debug!(feature = %id, "Patch changes nothing");
            return Ok(current.clone());
        }

        let Some(feature) = self.features.get_mut(id) else {
            return Err(WorkspaceError::NotFound(id.clone()));
        };
        if let Some(name) = rename {
            feature.name = name;
        }
        if let Some(geometry) = reshape {
            feature.derived = GeometryEngine::measure(&geometry);
            feature.geometry = geometry;
        }
        feature.version = feature.version.saturating_add(1);

        let updated = feature.clone();
        self.publish(StoreChange::Updated { feature: updated.clone() });
        Ok(updated)
    }

    /// Remove a feature and return it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NotFound`] if the id is absent.
    pub fn delete(&mut self, id: &FeatureId) -> Result<Feature, WorkspaceError> {
        let mut removed = self
            .features
            .remove(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        self.order.retain(|existing| existing != id);
        removed.version = removed.version.saturating_add(1);

        self.publish(StoreChange::Deleted { feature: removed.clone() });
        Ok(removed)
    }

    // -------------------------------------------------------------------
    // Remote-originated changes
    // -------------------------------------------------------------------

    /// Record a remote acknowledgement: attach the record id (if given)
    /// and raise the synced version. Lower versions never overwrite a
    /// higher one.
    ///
    /// Returns the updated feature, or `None` if it no longer exists.
    pub fn acknowledge(
        &mut self,
        id: &FeatureId,
        remote_id: Option<RemoteId>,
        version: u64,
    ) -> Option<Feature> {
        let feature = self.features.get_mut(id)?;
        if let Some(remote_id) = remote_id {
            feature.remote_id = Some(remote_id);
        }
        feature.synced_version = feature.synced_version.max(version);

        let acknowledged = feature.clone();
        self.publish(StoreChange::Synced {
            feature: acknowledged.clone(),
        });
        Some(acknowledged)
    }

    /// Replace the contents with features loaded from the remote store.
    ///
    /// Features whose geometry does not belong to this workspace, or whose
    /// id repeats, are skipped. Returns the number of features inserted.
    pub fn hydrate(&mut self, features: Vec<Feature>) -> usize {
        self.features.clear();
        self.order.clear();

        for mut feature in features {
            if self.check_kind(&feature.geometry).is_err()
                || self.features.contains_key(&feature.id)
            {
                debug!(feature = %feature.id, "Skipping loaded feature");
                continue;
            }
            feature.derived = GeometryEngine::measure(&feature.geometry);
            self.order.push(feature.id.clone());
            self.features.insert(feature.id.clone(), feature);
        }

        self.publish(StoreChange::Loaded {
            features: self.list(),
        });
        self.features.len()
    }

    /// Remove every feature. Returns the removed ids.
    pub fn clear(&mut self) -> Vec<FeatureId> {
        let removed = std::mem::take(&mut self.order);
        self.features.clear();
        self.publish(StoreChange::Cleared {
            removed: removed.clone(),
        });
        removed
    }

    fn check_kind(&self, geometry: &cartograph_types::Geometry) -> Result<(), ValidationError> {
        match self.kind.geometry_kind() {
            Some(kind) if kind == geometry.kind() => Ok(()),
            _ => Err(ValidationError::WrongKind {
                workspace: self.kind,
                kind: geometry.kind(),
            }),
        }
    }

    fn publish(&self, change: StoreChange) {
        // send only fails when nobody is subscribed, which is normal.
        let _ = self.tx.send(change);
    }
}

//! Marker drag tracking.
//!
//! While a marker is dragged the render surface owns its visual position and
//! the store is left alone. Only the drop commits a new coordinate.

use std::collections::BTreeMap;

use cartograph_types::{Coordinate, Feature, FeatureId, FeaturePatch, Geometry};
use tracing::debug;

use crate::error::WorkspaceError;
use crate::store::FeatureStore;

/// Tracks in-progress marker drags, at most one per marker.
#[derive(Debug, Default)]
pub struct MarkerDragController {
    /// Pre-drag coordinate per dragged marker.
    active: BTreeMap<FeatureId, Coordinate>,
}

impl MarkerDragController {
    /// Create a controller with no active drags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a drag. Returns `false` if the id is not a
    /// marker in the store.
    pub fn begin(&mut self, store: &FeatureStore, id: &FeatureId) -> bool {
        match store.get(id).map(|feature| &feature.geometry) {
            Some(Geometry::Point(origin)) => {
                self.active.insert(id.clone(), *origin);
                true
            }
            _ => false,
        }
    }

    /// Commit the final coordinate of a drag.
    ///
    /// A drop for a marker that no longer exists is discarded and returns
    /// `Ok(None)`. A drop without a recorded start is still committed.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`](crate::error::ValidationError) if the
    /// coordinate is not finite.
    pub fn end(
        &mut self,
        store: &mut FeatureStore,
        id: &FeatureId,
        coordinate: Coordinate,
    ) -> Result<Option<Feature>, WorkspaceError> {
        self.active.remove(id);
        if !store.contains(id) {
            debug!(marker = %id, "Drop for a removed marker discarded");
            return Ok(None);
        }
        store
            .update(id, FeaturePatch::geometry(Geometry::Point(coordinate)))
            .map(Some)
    }

    /// Abandon a drag without committing. Returns the pre-drag coordinate.
    pub fn cancel(&mut self, id: &FeatureId) -> Option<Coordinate> {
        self.active.remove(id)
    }

    /// Whether a marker is being dragged.
    pub fn is_dragging(&self, id: &FeatureId) -> bool {
        self.active.contains_key(id)
    }

    /// Pre-drag coordinate of a dragged marker.
    pub fn origin(&self, id: &FeatureId) -> Option<Coordinate> {
        self.active.get(id).copied()
    }

    /// Forget a marker that was removed.
    pub fn forget(&mut self, id: &FeatureId) {
        self.active.remove(id);
    }

    /// Drop every active drag.
    pub fn reset(&mut self) {
        self.active.clear();
    }
}

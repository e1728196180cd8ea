//! Translation of render-surface edit events into feature store mutations.
//!
//! The render surface names each primitive with an id of its own. The
//! reconciler enforces the id-correlation contract: a feature created from
//! a primitive takes that primitive's id, so every later event for the
//! primitive lands on the same feature.
//!
//! Per primitive it remembers only the last event it applied, which lets it
//! drop the redundant events surfaces tend to emit for one logical edit.
//!
//! | Event | Known id | Unknown id |
//! |-------|----------|------------|
//! | created | treated as an update | `create` |
//! | updated | `update` | logic fault, [`WorkspaceError::NotFound`] |
//! | deleted | `delete` | silently dropped |

use std::collections::BTreeMap;

use cartograph_types::{
    BoundingBox, Coordinate, Feature, FeatureId, FeaturePatch, GeometryKind, NewFeature,
    SurfaceEvent,
};
use tracing::{debug, warn};

use crate::error::WorkspaceError;
use crate::geometry::{GeometryEngine, from_parts};
use crate::store::FeatureStore;
use crate::surface::RenderSurface;

/// What a surface event did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// A feature was created.
    Created(Feature),
    /// A feature was updated.
    Updated(Feature),
    /// A feature was deleted.
    Deleted(Feature),
    /// Nothing changed (duplicate event, unknown deletion, drag event).
    Ignored,
}

/// Consumes render-surface edit events and drives the feature store.
#[derive(Debug, Default)]
pub struct DrawEventReconciler {
    /// Coordinates of the last applied event per primitive id.
    last_seen: BTreeMap<FeatureId, Vec<Coordinate>>,
    /// The feature the viewport is focused on.
    focused: Option<FeatureId>,
}

impl DrawEventReconciler {
    /// Create a reconciler with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one primitive event to the store.
    ///
    /// Marker drag events are not edit events and are ignored here; the
    /// [`MarkerDragController`](crate::drag::MarkerDragController) owns them.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`](crate::error::ValidationError) for an
    /// unfinished primitive (nothing is created), or
    /// [`WorkspaceError::NotFound`] for an update to a primitive that was
    /// never committed.
    pub fn handle(
        &mut self,
        store: &mut FeatureStore,
        event: &SurfaceEvent,
    ) -> Result<Reconciled, WorkspaceError> {
        match event {
            SurfaceEvent::PrimitiveCreated {
                id,
                kind,
                coordinates,
            } => self.on_created(store, id, *kind, coordinates),
            SurfaceEvent::PrimitiveUpdated { id, coordinates } => {
                self.on_updated(store, id, coordinates)
            }
            SurfaceEvent::PrimitiveDeleted { id, remaining } => {
                Ok(self.on_deleted(store, id, *remaining))
            }
            SurfaceEvent::MarkerDragStarted { .. }
            | SurfaceEvent::MarkerDragEnded { .. }
            | SurfaceEvent::MarkerDragCancelled { .. } => Ok(Reconciled::Ignored),
        }
    }

    fn on_created(
        &mut self,
        store: &mut FeatureStore,
        id: &FeatureId,
        kind: GeometryKind,
        coordinates: &[Coordinate],
    ) -> Result<Reconciled, WorkspaceError> {
        if self.is_duplicate(id, coordinates) {
            debug!(primitive = %id, "Duplicate create event dropped");
            return Ok(Reconciled::Ignored);
        }
        if store.contains(id) {
            debug!(primitive = %id, "Create event for a known primitive, applying as update");
            return self.on_updated(store, id, coordinates);
        }

        let geometry = from_parts(kind, coordinates.to_vec())?;
        let feature = store.create(NewFeature::from_geometry(geometry).with_id(id.clone()))?;
        self.remember(id, coordinates);
        Ok(Reconciled::Created(feature))
    }

    fn on_updated(
        &mut self,
        store: &mut FeatureStore,
        id: &FeatureId,
        coordinates: &[Coordinate],
    ) -> Result<Reconciled, WorkspaceError> {
        if self.is_duplicate(id, coordinates) {
            debug!(primitive = %id, "Duplicate update event dropped");
            return Ok(Reconciled::Ignored);
        }
        let Some(kind) = store.get(id).map(|feature| feature.geometry.kind()) else {
            warn!(primitive = %id, "Update event for a primitive that was never committed");
            return Err(WorkspaceError::NotFound(id.clone()));
        };

        let geometry = from_parts(kind, coordinates.to_vec())?;
        let feature = store.update(id, FeaturePatch::geometry(geometry))?;
        self.remember(id, coordinates);
        Ok(Reconciled::Updated(feature))
    }

    fn on_deleted(
        &mut self,
        store: &mut FeatureStore,
        id: &FeatureId,
        remaining: usize,
    ) -> Reconciled {
        if remaining == 0 {
            self.focused = None;
        }
        self.forget(id);
        match store.delete(id) {
            Ok(feature) => Reconciled::Deleted(feature),
            Err(_) => {
                debug!(primitive = %id, "Delete event for an uncommitted primitive dropped");
                Reconciled::Ignored
            }
        }
    }

    /// Focus the viewport on a feature's bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NotFound`] if the feature is absent.
    pub fn focus<S: RenderSurface + ?Sized>(
        &mut self,
        store: &FeatureStore,
        surface: &mut S,
        id: &FeatureId,
        padding: u32,
    ) -> Result<BoundingBox, WorkspaceError> {
        let bbox = store
            .get(id)
            .and_then(|feature| GeometryEngine::bounding_box(&feature.geometry))
            .ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        surface.focus_viewport(bbox, padding);
        self.focused = Some(id.clone());
        Ok(bbox)
    }

    /// The currently focused feature.
    pub const fn focused(&self) -> Option<&FeatureId> {
        self.focused.as_ref()
    }

    /// Track a feature's stored coordinates as the last seen state of its
    /// primitive, so edits made outside the surface (drags, path points)
    /// are not mistaken for duplicates later.
    pub fn observe(&mut self, feature: &Feature) {
        self.remember(&feature.id, feature.geometry.coordinates());
    }

    /// Drop all knowledge of a removed feature.
    pub fn forget(&mut self, id: &FeatureId) {
        self.last_seen.remove(id);
        if self.focused.as_ref() == Some(id) {
            self.focused = None;
        }
    }

    /// Drop all history and focus.
    pub fn reset(&mut self) {
        self.last_seen.clear();
        self.focused = None;
    }

    fn is_duplicate(&self, id: &FeatureId, coordinates: &[Coordinate]) -> bool {
        self.last_seen
            .get(id)
            .is_some_and(|seen| seen.as_slice() == coordinates)
    }

    fn remember(&mut self, id: &FeatureId, coordinates: &[Coordinate]) {
        self.last_seen.insert(id.clone(), coordinates.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use cartograph_types::{Geometry, WorkspaceKind};

    use super::*;
    use crate::error::ValidationError;
    use crate::store::DEFAULT_CHANGE_CAPACITY;
    use crate::surface::CommandSurface;

    fn square(size: f64) -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(size, 0.0),
            Coordinate::new(size, size),
            Coordinate::new(0.0, size),
            Coordinate::new(0.0, 0.0),
        ]
    }

    fn created(id: &str, coordinates: Vec<Coordinate>) -> SurfaceEvent {
        SurfaceEvent::PrimitiveCreated {
            id: FeatureId::from(id),
            kind: GeometryKind::Polygon,
            coordinates,
        }
    }

    fn updated(id: &str, coordinates: Vec<Coordinate>) -> SurfaceEvent {
        SurfaceEvent::PrimitiveUpdated {
            id: FeatureId::from(id),
            coordinates,
        }
    }

    fn deleted(id: &str, remaining: usize) -> SurfaceEvent {
        SurfaceEvent::PrimitiveDeleted {
            id: FeatureId::from(id),
            remaining,
        }
    }

    fn setup() -> (DrawEventReconciler, FeatureStore) {
        (
            DrawEventReconciler::new(),
            FeatureStore::new(WorkspaceKind::AreaSet, DEFAULT_CHANGE_CAPACITY),
        )
    }

    #[test]
    fn created_primitive_keeps_surface_id() {
        let (mut reconciler, mut store) = setup();
        let result = reconciler.handle(&mut store, &created("draw-1", square(0.01)));
        assert!(matches!(result, Ok(Reconciled::Created(ref f)) if f.id == FeatureId::from("draw-1")));
        assert!(store.contains(&FeatureId::from("draw-1")));
    }

    #[test]
    fn duplicate_events_are_suppressed() {
        let (mut reconciler, mut store) = setup();
        let _ = reconciler.handle(&mut store, &created("p", square(0.01)));
        let again = reconciler.handle(&mut store, &created("p", square(0.01)));
        assert!(matches!(again, Ok(Reconciled::Ignored)));

        let _ = reconciler.handle(&mut store, &updated("p", square(0.02)));
        let repeat = reconciler.handle(&mut store, &updated("p", square(0.02)));
        assert!(matches!(repeat, Ok(Reconciled::Ignored)));
        assert!(store.get(&FeatureId::from("p")).is_some_and(|f| f.version == 2));
    }

    #[test]
    fn unfinished_polygon_creates_nothing() {
        let (mut reconciler, mut store) = setup();
        let partial = vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0)];
        let result = reconciler.handle(&mut store, &created("p", partial));
        assert!(matches!(
            result,
            Err(WorkspaceError::Validation(ValidationError::IncompleteGeometry { .. }))
        ));
        assert!(store.is_empty());

        // Finishing the same primitive later still creates it.
        let result = reconciler.handle(&mut store, &created("p", square(0.01)));
        assert!(matches!(result, Ok(Reconciled::Created(_))));
    }

    #[test]
    fn update_of_unknown_primitive_is_not_found() {
        let (mut reconciler, mut store) = setup();
        let result = reconciler.handle(&mut store, &updated("ghost", square(0.01)));
        assert!(matches!(result, Err(WorkspaceError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn delete_of_unknown_primitive_is_silent() {
        let (mut reconciler, mut store) = setup();
        let result = reconciler.handle(&mut store, &deleted("ghost", 0));
        assert!(matches!(result, Ok(Reconciled::Ignored)));
    }

    #[test]
    fn event_sequences_keep_one_consistent_feature() {
        let (mut reconciler, mut store) = setup();
        let events = [
            created("p", square(0.01)),
            updated("p", square(0.03)),
            created("p", square(0.02)),
            deleted("p", 0),
            deleted("p", 0),
            created("p", square(0.04)),
            updated("p", square(0.05)),
        ];
        for event in &events {
            let _ = reconciler.handle(&mut store, event);
            assert!(store.len() <= 1);
            for feature in store.list() {
                assert_eq!(feature.derived, GeometryEngine::measure(&feature.geometry));
            }
        }
        let last = store.get(&FeatureId::from("p"));
        assert!(last.is_some_and(|f| f.geometry == Geometry::Polygon(square(0.05))));
    }

    #[test]
    fn focus_clears_when_surface_empties() {
        let (mut reconciler, mut store) = setup();
        let mut surface = CommandSurface::new(16);
        let _ = reconciler.handle(&mut store, &created("a", square(0.01)));
        let _ = reconciler.handle(&mut store, &created("b", square(0.02)));

        let bbox = reconciler
            .focus(&store, &mut surface, &FeatureId::from("b"), 50)
            .ok();
        assert!(bbox.is_some_and(|b| (b.max_lng() - 0.02).abs() < 1e-12));
        assert_eq!(surface.viewport(), bbox);

        // Deleting another primitive keeps focus while primitives remain.
        let _ = reconciler.handle(&mut store, &deleted("a", 1));
        assert_eq!(reconciler.focused(), Some(&FeatureId::from("b")));

        // The surface reports nothing left, even for an unknown id.
        let _ = reconciler.handle(&mut store, &deleted("zzz", 0));
        assert_eq!(reconciler.focused(), None);
    }

    #[test]
    fn deleting_focused_feature_clears_focus() {
        let (mut reconciler, mut store) = setup();
        let mut surface = CommandSurface::new(16);
        let _ = reconciler.handle(&mut store, &created("a", square(0.01)));
        let _ = reconciler.handle(&mut store, &created("b", square(0.01)));
        let _ = reconciler.focus(&store, &mut surface, &FeatureId::from("a"), 50);
        let _ = reconciler.handle(&mut store, &deleted("a", 1));
        assert_eq!(reconciler.focused(), None);
    }

    #[test]
    fn focus_of_unknown_feature_fails() {
        let (mut reconciler, store) = setup();
        let mut surface = CommandSurface::new(16);
        let result = reconciler.focus(&store, &mut surface, &FeatureId::from("x"), 50);
        assert!(matches!(result, Err(WorkspaceError::NotFound(_))));
        assert_eq!(surface.viewport(), None);
    }
}

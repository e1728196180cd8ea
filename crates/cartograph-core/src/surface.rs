//! The render surface seam and the store-to-surface adapter stage.
//!
//! The render surface is the external map component that draws primitives
//! and overlays. The core only calls back into it through
//! [`RenderSurface`]. Every method is idempotent: rendering a primitive twice
//! draws it once, removing an absent primitive does nothing.
//!
//! [`apply_change`] is the pipeline stage that mirrors feature store changes
//! onto the surface. [`CommandSurface`] is the implementation used by the
//! server: it forwards each call to connected map clients as a
//! [`RenderCommand`] and mirrors the resulting surface state so layer
//! existence can be queried.

use std::collections::BTreeMap;

use cartograph_types::{
    BoundingBox, DrawLayer, Feature, FeatureId, Geometry, PrimitiveStyle, RenderCommand, SourceId,
    StoreChange,
};
use serde_json::Value;
use tokio::sync::broadcast;

/// Calls the core makes into the render surface.
pub trait RenderSurface: Send {
    /// Draw (or redraw) a primitive.
    fn render_primitive(&mut self, id: &FeatureId, geometry: &Geometry, style: &PrimitiveStyle);

    /// Remove a primitive.
    fn remove_primitive(&mut self, id: &FeatureId);

    /// Register a new dataset source.
    fn register_source(&mut self, source_id: &SourceId, dataset: &Value);

    /// Replace the data of an existing source.
    fn update_source(&mut self, source_id: &SourceId, dataset: &Value);

    /// Add a drawing layer.
    fn add_layer(&mut self, layer: &DrawLayer);

    /// Whether a drawing layer exists on the surface.
    fn has_layer(&self, layer_id: &str) -> bool;

    /// Show or hide a drawing layer.
    fn set_layer_visibility(&mut self, layer_id: &str, visible: bool);

    /// Fit the viewport to a bounding box.
    fn focus_viewport(&mut self, bbox: BoundingBox, padding: u32);

    /// Commands that rebuild the current surface state, for a newly
    /// attached client. Surfaces that keep no state return nothing.
    fn replay(&self) -> Vec<RenderCommand> {
        Vec::new()
    }
}

/// Mirror a store change onto the render surface.
pub fn apply_change<S: RenderSurface + ?Sized>(surface: &mut S, change: &StoreChange) {
    match change {
        StoreChange::Created { feature } | StoreChange::Updated { feature } => {
            render(surface, feature);
        }
        StoreChange::Deleted { feature } => surface.remove_primitive(&feature.id),
        StoreChange::Loaded { features } => {
            for feature in features {
                render(surface, feature);
            }
        }
        StoreChange::Cleared { removed } => {
            for id in removed {
                surface.remove_primitive(id);
            }
        }
        StoreChange::Synced { .. } => {}
    }
}

fn render<S: RenderSurface + ?Sized>(surface: &mut S, feature: &Feature) {
    let style = PrimitiveStyle {
        label: feature.name.clone(),
    };
    surface.render_primitive(&feature.id, &feature.geometry, &style);
}

// ---------------------------------------------------------------------------
// Command surface
// ---------------------------------------------------------------------------

/// A render surface that broadcasts [`RenderCommand`]s and mirrors the
/// state they produce.
#[derive(Debug)]
pub struct CommandSurface {
    /// Outbound command channel.
    tx: broadcast::Sender<RenderCommand>,
    /// Primitives currently drawn.
    primitives: BTreeMap<FeatureId, (Geometry, PrimitiveStyle)>,
    /// Registered sources and their data.
    sources: BTreeMap<SourceId, Value>,
    /// Drawing layers and their visibility.
    layers: BTreeMap<String, (DrawLayer, bool)>,
    /// The last focused box.
    viewport: Option<BoundingBox>,
}

impl CommandSurface {
    /// Create a surface with its own command channel.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self::with_sender(tx)
    }

    /// Create a surface that sends on an existing channel.
    pub const fn with_sender(tx: broadcast::Sender<RenderCommand>) -> Self {
        Self {
            tx,
            primitives: BTreeMap::new(),
            sources: BTreeMap::new(),
            layers: BTreeMap::new(),
            viewport: None,
        }
    }

    /// Subscribe to outbound commands.
    pub fn subscribe(&self) -> broadcast::Receiver<RenderCommand> {
        self.tx.subscribe()
    }

    /// Geometry of a drawn primitive.
    pub fn primitive(&self, id: &FeatureId) -> Option<&Geometry> {
        self.primitives.get(id).map(|(geometry, _)| geometry)
    }

    /// Number of drawn primitives.
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Data of a registered source.
    pub fn source(&self, source_id: &SourceId) -> Option<&Value> {
        self.sources.get(source_id)
    }

    /// Visibility of a drawing layer, if it exists.
    pub fn layer_visible(&self, layer_id: &str) -> Option<bool> {
        self.layers.get(layer_id).map(|(_, visible)| *visible)
    }

    /// The last focused box.
    pub const fn viewport(&self) -> Option<BoundingBox> {
        self.viewport
    }

    fn send(&self, command: RenderCommand) {
        // No connected client is fine; the mirror keeps the state.
        let _ = self.tx.send(command);
    }
}

impl RenderSurface for CommandSurface {
    fn render_primitive(&mut self, id: &FeatureId, geometry: &Geometry, style: &PrimitiveStyle) {
        self.primitives
            .insert(id.clone(), (geometry.clone(), style.clone()));
        self.send(RenderCommand::RenderPrimitive {
            id: id.clone(),
            geometry: geometry.clone(),
            style: style.clone(),
        });
    }

    fn remove_primitive(&mut self, id: &FeatureId) {
        if self.primitives.remove(id).is_some() {
            self.send(RenderCommand::RemovePrimitive { id: id.clone() });
        }
    }

    fn register_source(&mut self, source_id: &SourceId, dataset: &Value) {
        self.sources.insert(source_id.clone(), dataset.clone());
        self.send(RenderCommand::RegisterSource {
            source_id: source_id.clone(),
            dataset: dataset.clone(),
        });
    }

    fn update_source(&mut self, source_id: &SourceId, dataset: &Value) {
        if let Some(existing) = self.sources.get_mut(source_id) {
            existing.clone_from(dataset);
            self.send(RenderCommand::UpdateSource {
                source_id: source_id.clone(),
                dataset: dataset.clone(),
            });
        }
    }

    fn add_layer(&mut self, layer: &DrawLayer) {
        if self.layers.contains_key(&layer.id) {
            return;
        }
        self.layers.insert(layer.id.clone(), (layer.clone(), true));
        self.send(RenderCommand::AddLayer {
            layer: layer.clone(),
        });
    }

    fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    fn set_layer_visibility(&mut self, layer_id: &str, visible: bool) {
        if let Some((_, current)) = self.layers.get_mut(layer_id) {
            *current = visible;
            self.send(RenderCommand::SetLayerVisibility {
                layer_id: layer_id.to_owned(),
                visible,
            });
        }
    }

    fn focus_viewport(&mut self, bbox: BoundingBox, padding: u32) {
        self.viewport = Some(bbox);
        self.send(RenderCommand::FocusViewport { bbox, padding });
    }

    fn replay(&self) -> Vec<RenderCommand> {
        let sources = self
            .sources
            .iter()
            .map(|(source_id, dataset)| RenderCommand::RegisterSource {
                source_id: source_id.clone(),
                dataset: dataset.clone(),
            });
        let layers = self.layers.values().flat_map(|(layer, visible)| {
            let added = RenderCommand::AddLayer {
                layer: layer.clone(),
            };
            let hidden = (!visible).then(|| RenderCommand::SetLayerVisibility {
                layer_id: layer.id.clone(),
                visible: false,
            });
            std::iter::once(added).chain(hidden)
        });
        let primitives = self
            .primitives
            .iter()
            .map(|(id, (geometry, style))| RenderCommand::RenderPrimitive {
                id: id.clone(),
                geometry: geometry.clone(),
                style: style.clone(),
            });
        sources.chain(layers).chain(primitives).collect()
    }
}

#[cfg(test)]
mod tests {
    use cartograph_types::{Coordinate, Measurements};

    use super::*;

    fn marker(id: &str) -> Feature {
        Feature {
            id: FeatureId::from(id),
            name: String::from("Untitled 1"),
            geometry: Geometry::Point(Coordinate::new(1.0, 2.0)),
            derived: Measurements::None,
            owner_id: None,
            remote_id: None,
            version: 1,
            synced_version: 0,
        }
    }

    #[test]
    fn adapter_is_idempotent() {
        let mut surface = CommandSurface::new(16);
        let created = StoreChange::Created { feature: marker("m1") };
        apply_change(&mut surface, &created);
        apply_change(&mut surface, &created);
        assert_eq!(surface.primitive_count(), 1);

        let deleted = StoreChange::Deleted { feature: marker("m1") };
        apply_change(&mut surface, &deleted);
        apply_change(&mut surface, &deleted);
        assert_eq!(surface.primitive_count(), 0);
    }

    #[test]
    fn cleared_removes_everything_and_synced_is_ignored() {
        let mut surface = CommandSurface::new(16);
        apply_change(
            &mut surface,
            &StoreChange::Loaded {
                features: vec![marker("a"), marker("b")],
            },
        );
        let mut rx = surface.subscribe();
        apply_change(&mut surface, &StoreChange::Synced { feature: marker("a") });
        assert!(rx.try_recv().is_err());

        apply_change(
            &mut surface,
            &StoreChange::Cleared {
                removed: vec![FeatureId::from("a"), FeatureId::from("b")],
            },
        );
        assert_eq!(surface.primitive_count(), 0);
        assert!(matches!(rx.try_recv(), Ok(RenderCommand::RemovePrimitive { .. })));
    }

    #[test]
    fn visibility_requires_existing_layer() {
        let mut surface = CommandSurface::new(16);
        surface.set_layer_visibility("missing", false);
        assert_eq!(surface.layer_visible("missing"), None);

        surface.add_layer(&DrawLayer {
            id: String::from("layer-a-fill"),
            source_id: SourceId::from("source-a"),
            paint: cartograph_types::LayerPaint::Fill {
                color: String::from("#000000"),
                opacity: 0.5,
            },
        });
        surface.set_layer_visibility("layer-a-fill", false);
        assert_eq!(surface.layer_visible("layer-a-fill"), Some(false));
    }

    #[test]
    fn replay_rebuilds_sources_then_primitives() {
        let mut surface = CommandSurface::new(16);
        surface.register_source(
            &SourceId::from("s"),
            &serde_json::json!({"type": "FeatureCollection", "features": []}),
        );
        apply_change(
            &mut surface,
            &StoreChange::Created { feature: marker("m") },
        );
        let replay = surface.replay();
        assert_eq!(replay.len(), 2);
        assert!(matches!(replay.first(), Some(RenderCommand::RegisterSource { .. })));
    }
}

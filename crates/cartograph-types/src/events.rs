//! Messages exchanged with the render surface and with UI observers.
//!
//! - [`SurfaceEvent`] flows in: low-level edit events from the drawing
//!   surface.
//! - [`RenderCommand`] flows out: instructions for the drawing surface.
//! - [`StoreChange`] fans out from the feature store to every observer.
//! - [`Notice`] is a user-visible notification.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::NoticeLevel;
use crate::geometry::{BoundingBox, Coordinate, Geometry, GeometryKind};
use crate::ids::{FeatureId, SourceId};
use crate::structs::{DrawLayer, Feature, PrimitiveStyle};

/// An edit event emitted by the render surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SurfaceEvent {
    /// A primitive was finished (polygon ring closed, point placed).
    PrimitiveCreated {
        /// Surface identifier of the primitive.
        id: FeatureId,
        /// Shape of the primitive.
        kind: GeometryKind,
        /// Positions of the primitive.
        coordinates: Vec<Coordinate>,
    },
    /// An existing primitive was reshaped or moved.
    PrimitiveUpdated {
        /// Surface identifier of the primitive.
        id: FeatureId,
        /// New positions of the primitive.
        coordinates: Vec<Coordinate>,
    },
    /// A primitive was removed from the surface.
    PrimitiveDeleted {
        /// Surface identifier of the primitive.
        id: FeatureId,
        /// Number of primitives left on the surface after the removal.
        remaining: usize,
    },
    /// The user grabbed a marker.
    MarkerDragStarted {
        /// The marker being dragged.
        id: FeatureId,
    },
    /// The user released a dragged marker.
    MarkerDragEnded {
        /// The marker that was dragged.
        id: FeatureId,
        /// Final position.
        coordinate: Coordinate,
    },
    /// The surface aborted a drag (marker removed, escape pressed).
    MarkerDragCancelled {
        /// The marker that was being dragged.
        id: FeatureId,
    },
}

impl SurfaceEvent {
    /// The primitive this event is about.
    pub const fn primitive_id(&self) -> &FeatureId {
        match self {
            Self::PrimitiveCreated { id, .. }
            | Self::PrimitiveUpdated { id, .. }
            | Self::PrimitiveDeleted { id, .. }
            | Self::MarkerDragStarted { id }
            | Self::MarkerDragEnded { id, .. }
            | Self::MarkerDragCancelled { id } => id,
        }
    }
}

/// An instruction for the render surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "command", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RenderCommand {
    /// Draw or redraw a feature primitive.
    RenderPrimitive {
        /// Primitive identifier (equal to the feature id).
        id: FeatureId,
        /// Geometry to draw.
        geometry: Geometry,
        /// How to draw it.
        style: PrimitiveStyle,
    },
    /// Remove a feature primitive.
    RemovePrimitive {
        /// Primitive identifier.
        id: FeatureId,
    },
    /// Register a dataset source.
    RegisterSource {
        /// Source identifier.
        source_id: SourceId,
        /// `GeoJSON` dataset.
        #[ts(type = "unknown")]
        dataset: serde_json::Value,
    },
    /// Replace the data of an existing source.
    UpdateSource {
        /// Source identifier.
        source_id: SourceId,
        /// `GeoJSON` dataset.
        #[ts(type = "unknown")]
        dataset: serde_json::Value,
    },
    /// Add a drawing layer for a source.
    AddLayer {
        /// The drawing layer.
        layer: DrawLayer,
    },
    /// Show or hide a drawing layer.
    SetLayerVisibility {
        /// Drawing layer identifier.
        layer_id: String,
        /// Whether the layer is shown.
        visible: bool,
    },
    /// Move the viewport to fit a bounding box.
    FocusViewport {
        /// Area to fit.
        bbox: BoundingBox,
        /// Padding around the box in pixels.
        padding: u32,
    },
}

/// A feature store change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StoreChange {
    /// A feature was inserted.
    Created {
        /// The finalized feature.
        feature: Feature,
    },
    /// A feature was patched.
    Updated {
        /// The feature after the patch.
        feature: Feature,
    },
    /// A feature was removed.
    Deleted {
        /// The removed feature.
        feature: Feature,
    },
    /// Remote acknowledgement metadata (record id, synced version) changed.
    Synced {
        /// The feature after the acknowledgement.
        feature: Feature,
    },
    /// The store was populated from the remote store.
    Loaded {
        /// All loaded features.
        features: Vec<Feature>,
    },
    /// The store was emptied (sign-out or re-activation).
    Cleared {
        /// Identifiers of the features that were removed.
        removed: Vec<FeatureId>,
    },
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text.
    pub message: String,
}

impl Notice {
    /// A success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// An informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// An error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_event_parses_from_client_json() {
        let json = serde_json::json!({
            "event": "primitive_deleted",
            "id": "draw-1",
            "remaining": 0
        });
        let event: Result<SurfaceEvent, _> = serde_json::from_value(json);
        assert!(matches!(
            event,
            Ok(SurfaceEvent::PrimitiveDeleted { remaining: 0, .. })
        ));
    }

    #[test]
    fn primitive_id_covers_every_variant() {
        let id = FeatureId::from("m1");
        let event = SurfaceEvent::MarkerDragEnded {
            id: id.clone(),
            coordinate: Coordinate::new(0.0, 0.0),
        };
        assert_eq!(event.primitive_id(), &id);
    }
}

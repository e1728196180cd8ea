//! Core entity structs: features, measurements, remote records, and layers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::geometry::{Geometry, GeometryKind};
use crate::ids::{FeatureId, LayerId, RemoteId, SourceId, UserId};

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Measurements derived from a feature's geometry.
///
/// Never edited directly. The feature store recomputes them whenever the
/// geometry changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Measurements {
    /// Polygon area.
    Area {
        /// Geodesic area in square meters.
        square_meters: f64,
    },
    /// Path lengths.
    Path {
        /// Length of each consecutive segment in kilometers. Empty for
        /// paths with fewer than two points.
        segment_km: Vec<f64>,
        /// Sum of all segment lengths in kilometers.
        total_km: f64,
    },
    /// Markers carry no measurements.
    None,
}

impl Measurements {
    /// The area in square meters, or zero for non-polygon features.
    pub const fn square_meters(&self) -> f64 {
        match self {
            Self::Area { square_meters } => *square_meters,
            Self::Path { .. } | Self::None => 0.0,
        }
    }

    /// The total path length in kilometers, or zero for non-path features.
    pub const fn total_km(&self) -> f64 {
        match self {
            Self::Path { total_km, .. } => *total_km,
            Self::Area { .. } | Self::None => 0.0,
        }
    }
}

/// One user-created geometric object with identity, geometry, and derived
/// measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Feature {
    /// Stable identifier, equal to the render-surface primitive id.
    pub id: FeatureId,
    /// User-editable label.
    pub name: String,
    /// The feature's geometry.
    pub geometry: Geometry,
    /// Measurements consistent with `geometry`.
    pub derived: Measurements,
    /// The authenticated user owning this feature, when a session is active.
    pub owner_id: Option<UserId>,
    /// Identifier of the remote record once the first write succeeded.
    pub remote_id: Option<RemoteId>,
    /// Local version, bumped by every mutation.
    pub version: u64,
    /// Highest version the remote store acknowledged.
    pub synced_version: u64,
}

/// Input to feature creation: everything but the derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewFeature {
    /// Identifier to use. A fresh one is generated when absent.
    pub id: Option<FeatureId>,
    /// Label to use. Defaults to `Untitled N`.
    pub name: Option<String>,
    /// The geometry.
    pub geometry: Geometry,
}

impl NewFeature {
    /// A new feature with only a geometry; id and name are defaulted.
    pub const fn from_geometry(geometry: Geometry) -> Self {
        Self {
            id: None,
            name: None,
            geometry,
        }
    }

    /// Use the given identifier.
    #[must_use]
    pub fn with_id(mut self, id: FeatureId) -> Self {
        self.id = Some(id);
        self
    }

    /// Use the given name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A partial update to a feature. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FeaturePatch {
    /// New label.
    pub name: Option<String>,
    /// New geometry. Must keep the feature's geometry kind.
    pub geometry: Option<Geometry>,
}

impl FeaturePatch {
    /// A patch that only renames.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            geometry: None,
        }
    }

    /// A patch that only replaces the geometry.
    pub const fn geometry(geometry: Geometry) -> Self {
        Self {
            name: None,
            geometry: Some(geometry),
        }
    }

    /// Whether the patch changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.geometry.is_none()
    }
}

// ---------------------------------------------------------------------------
// Remote records
// ---------------------------------------------------------------------------

/// The body of a remote feature record, without its record id.
///
/// `coordinates` holds the geometry serialized to the flat string form;
/// `size` is the area rounded to two decimals for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RecordDraft {
    /// Owning user.
    pub owner_id: UserId,
    /// Geometry kind of the serialized coordinates.
    pub kind: GeometryKind,
    /// Feature label.
    pub name: String,
    /// Rounded area in square meters (zero for markers and paths).
    pub size: f64,
    /// Serialized coordinates.
    pub coordinates: String,
    /// Local version this draft was produced from.
    pub version: u64,
}

/// A feature record as stored by the remote document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FeatureRecord {
    /// Record identifier assigned by the remote store.
    pub id: RemoteId,
    /// Owning user.
    pub owner_id: UserId,
    /// Geometry kind of the serialized coordinates.
    pub kind: GeometryKind,
    /// Feature label.
    pub name: String,
    /// Rounded area in square meters.
    pub size: f64,
    /// Serialized coordinates.
    pub coordinates: String,
    /// Version of the last applied write.
    pub version: u64,
}

impl FeatureRecord {
    /// Attach a record id to a draft.
    pub fn from_draft(id: RemoteId, draft: RecordDraft) -> Self {
        Self {
            id,
            owner_id: draft.owner_id,
            kind: draft.kind,
            name: draft.name,
            size: draft.size,
            coordinates: draft.coordinates,
            version: draft.version,
        }
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// An uploaded dataset rendered as a toggleable overlay.
///
/// The dataset itself is held by the layer manager; this is the tracked,
/// UI-facing part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Layer {
    /// Unique layer identifier.
    pub layer_id: LayerId,
    /// Lowercased file name the layer was uploaded from.
    pub name: String,
    /// Render-surface source holding the dataset.
    pub source_id: SourceId,
    /// Colour assigned at creation, `#rrggbb`.
    pub color: String,
    /// Whether the overlay is shown.
    pub visible: bool,
}

/// Paint of one render-surface drawing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LayerPaint {
    /// Filled polygons.
    Fill {
        /// Fill colour.
        color: String,
        /// Fill opacity in `[0, 1]`.
        opacity: f64,
    },
    /// Boundary lines.
    Line {
        /// Line colour.
        color: String,
        /// Line width in pixels.
        width: f64,
    },
}

/// A drawing layer registered on the render surface for a dataset source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DrawLayer {
    /// Render-surface layer identifier.
    pub id: String,
    /// Source the layer draws from.
    pub source_id: SourceId,
    /// How the layer is painted.
    pub paint: LayerPaint,
}

/// Style attached to a rendered feature primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PrimitiveStyle {
    /// Label shown with the primitive.
    pub label: String,
}

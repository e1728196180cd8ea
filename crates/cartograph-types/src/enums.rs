//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::geometry::GeometryKind;

/// The kind of workspace a feature store belongs to.
///
/// Each kind accepts exactly one geometry kind; the layer set holds no
/// features at all and only tracks uploaded overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum WorkspaceKind {
    /// Polygons drawn on the map, measured by area.
    AreaSet,
    /// Point markers.
    MarkerSet,
    /// A single measured path.
    Path,
    /// Uploaded dataset overlays only.
    LayerSet,
}

impl WorkspaceKind {
    /// The geometry kind this workspace stores, if it stores features.
    pub const fn geometry_kind(self) -> Option<GeometryKind> {
        match self {
            Self::AreaSet => Some(GeometryKind::Polygon),
            Self::MarkerSet => Some(GeometryKind::Point),
            Self::Path => Some(GeometryKind::Path),
            Self::LayerSet => None,
        }
    }

    /// Human-readable noun used in notices ("Area added").
    pub const fn noun(self) -> &'static str {
        match self {
            Self::AreaSet => "Area",
            Self::MarkerSet => "Marker",
            Self::Path => "Path",
            Self::LayerSet => "Layer",
        }
    }
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NoticeLevel {
    /// An operation completed.
    Success,
    /// Informational message.
    Info,
    /// A recoverable failure the user should know about.
    Error,
}

/// Result of uploading a dataset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UploadOutcome {
    /// A new layer was registered.
    Created {
        /// The new layer.
        layer_id: crate::ids::LayerId,
    },
    /// An existing layer for the same file name received new data.
    DataUpdated {
        /// The existing layer.
        layer_id: crate::ids::LayerId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_kinds_map_to_geometry() {
        assert_eq!(WorkspaceKind::AreaSet.geometry_kind(), Some(GeometryKind::Polygon));
        assert_eq!(WorkspaceKind::MarkerSet.geometry_kind(), Some(GeometryKind::Point));
        assert_eq!(WorkspaceKind::Path.geometry_kind(), Some(GeometryKind::Path));
        assert_eq!(WorkspaceKind::LayerSet.geometry_kind(), None);
    }

    #[test]
    fn workspace_kind_uses_snake_case() {
        let json = serde_json::to_string(&WorkspaceKind::AreaSet).ok();
        assert_eq!(json.as_deref(), Some("\"area_set\""));
    }
}

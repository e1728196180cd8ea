//! Uploaded dataset overlays.
//!
//! A [`Layer`] is one uploaded `GeoJSON` file rendered as a fill layer plus a
//! boundary line layer sharing a source. Layers live beside the feature
//! store, are never persisted, and are never deleted.
//!
//! Layers are keyed by lowercased file name. Uploading a name that already
//! has a layer replaces the source data and keeps id, color, and visibility.

use cartograph_types::{DrawLayer, Layer, LayerId, LayerPaint, SourceId, UploadOutcome};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::LayerStyleConfig;
use crate::error::ValidationError;
use crate::surface::RenderSurface;

/// File extension of accepted uploads.
const GEOJSON_EXTENSION: &str = ".geojson";

/// Values of the `GeoJSON` `type` member accepted at the top level.
const GEOJSON_TYPES: &[&str] = &[
    "FeatureCollection",
    "Feature",
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// One file of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Original file name.
    pub name: String,
    /// Raw file contents.
    pub contents: String,
}

/// Per-file result of a batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// The file name as uploaded.
    pub file_name: String,
    /// What happened, when the upload succeeded.
    pub outcome: Option<UploadOutcome>,
    /// Why the upload was rejected.
    pub error: Option<String>,
}

impl UploadReport {
    /// Build the report for one file.
    pub fn new(file_name: impl Into<String>, result: &Result<UploadOutcome, ValidationError>) -> Self {
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome.clone()), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            file_name: file_name.into(),
            outcome,
            error,
        }
    }
}

/// Manages uploaded dataset layers and their render-surface counterparts.
#[derive(Debug)]
pub struct LayerManager {
    /// Tracked layers in upload order.
    layers: Vec<Layer>,
    /// Sequence number for the next new layer.
    next_seq: u64,
    /// Paint settings for new drawing layers.
    style: LayerStyleConfig,
}

impl LayerManager {
    /// Create an empty manager.
    pub const fn new(style: LayerStyleConfig) -> Self {
        Self {
            layers: Vec::new(),
            next_seq: 0,
            style,
        }
    }

    /// Snapshot of all layers in upload order.
    pub fn layers(&self) -> Vec<Layer> {
        self.layers.clone()
    }

    /// Look up a layer by id.
    pub fn get(&self, layer_id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.layer_id == *layer_id)
    }

    /// Parse and upload one file.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedFileType`] for anything but
    /// `.geojson`, or [`ValidationError::MalformedDataset`] when the content
    /// is not a `GeoJSON` object. Nothing changes on error.
    pub fn upload<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        file_name: &str,
        contents: &str,
    ) -> Result<UploadOutcome, ValidationError> {
        let name = file_name.to_lowercase();
        if !name.ends_with(GEOJSON_EXTENSION) {
            return Err(ValidationError::UnsupportedFileType {
                file_name: file_name.to_owned(),
            });
        }
        let dataset: Value =
            serde_json::from_str(contents).map_err(|err| ValidationError::MalformedDataset {
                file_name: file_name.to_owned(),
                reason: err.to_string(),
            })?;
        self.upload_dataset(surface, &name, dataset)
    }

    /// Upload an already parsed dataset under a file name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedDataset`] if the value is not a
    /// `GeoJSON` object.
    pub fn upload_dataset<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        file_name: &str,
        dataset: Value,
    ) -> Result<UploadOutcome, ValidationError> {
        check_geojson(file_name, &dataset)?;
        let name = file_name.to_lowercase();

        if let Some(existing) = self.layers.iter().find(|layer| layer.name == name) {
            surface.update_source(&existing.source_id, &dataset);
            info!(layer = %existing.layer_id, "Layer data updated");
            return Ok(UploadOutcome::DataUpdated {
                layer_id: existing.layer_id.clone(),
            });
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let layer = Layer {
            layer_id: LayerId::new(format!("layer-{name}-{seq}")),
            source_id: SourceId::new(format!("source-{name}-{seq}")),
            color: random_color(),
            visible: true,
            name,
        };

        surface.register_source(&layer.source_id, &dataset);
        surface.add_layer(&DrawLayer {
            id: fill_layer_id(&layer.layer_id),
            source_id: layer.source_id.clone(),
            paint: LayerPaint::Fill {
                color: layer.color.clone(),
                opacity: self.style.fill_opacity,
            },
        });
        surface.add_layer(&DrawLayer {
            id: line_layer_id(&layer.layer_id),
            source_id: layer.source_id.clone(),
            paint: LayerPaint::Line {
                color: layer.color.clone(),
                width: self.style.line_width,
            },
        });

        info!(layer = %layer.layer_id, color = %layer.color, "Layer registered");
        let layer_id = layer.layer_id.clone();
        self.layers.push(layer);
        Ok(UploadOutcome::Created { layer_id })
    }

    /// Upload several files, reporting each one individually.
    pub fn upload_all<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        files: &[UploadFile],
    ) -> Vec<(String, Result<UploadOutcome, ValidationError>)> {
        files
            .iter()
            .map(|file| {
                (
                    file.name.clone(),
                    self.upload(surface, &file.name, &file.contents),
                )
            })
            .collect()
    }

    /// Show or hide a layer.
    ///
    /// Does nothing and returns `false` when the layer is unknown or its
    /// drawing layers are missing from the surface, so the tracked flag and
    /// the surface can never disagree.
    pub fn set_visibility<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        layer_id: &LayerId,
        visible: bool,
    ) -> bool {
        let fill = fill_layer_id(layer_id);
        let line = line_layer_id(layer_id);
        let Some(layer) = self
            .layers
            .iter_mut()
            .find(|layer| layer.layer_id == *layer_id)
        else {
            debug!(layer = %layer_id, "Visibility change for unknown layer ignored");
            return false;
        };
        if !surface.has_layer(&fill) || !surface.has_layer(&line) {
            debug!(layer = %layer_id, "Visibility change for a layer missing from the surface ignored");
            return false;
        }

        surface.set_layer_visibility(&fill, visible);
        surface.set_layer_visibility(&line, visible);
        layer.visible = visible;
        true
    }
}

/// Id of the fill drawing layer of a layer.
pub fn fill_layer_id(layer_id: &LayerId) -> String {
    format!("{layer_id}-fill")
}

/// Id of the boundary drawing layer of a layer.
pub fn line_layer_id(layer_id: &LayerId) -> String {
    format!("{layer_id}-line")
}

/// A random `#rrggbb` color.
fn random_color() -> String {
    let value: u32 = rand::rng().random_range(0..=0x00FF_FFFF);
    format!("#{value:06x}")
}

fn check_geojson(file_name: &str, dataset: &Value) -> Result<(), ValidationError> {
    let malformed = |reason: &str| ValidationError::MalformedDataset {
        file_name: file_name.to_owned(),
        reason: reason.to_owned(),
    };
    let kind = dataset
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing GeoJSON type"))?;
    if !GEOJSON_TYPES.contains(&kind) {
        return Err(malformed("unknown GeoJSON type"));
    }
    if kind == "FeatureCollection" && !dataset.get("features").is_some_and(Value::is_array) {
        return Err(malformed("feature collection without a features array"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::CommandSurface;

    const COLLECTION: &str = r#"{"type":"FeatureCollection","features":[]}"#;
    const POLYGON: &str = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#;

    fn setup() -> (LayerManager, CommandSurface) {
        (
            LayerManager::new(LayerStyleConfig::default()),
            CommandSurface::new(64),
        )
    }

    #[test]
    fn first_upload_registers_source_and_two_layers() {
        let (mut layers, mut surface) = setup();
        let outcome = layers.upload(&mut surface, "Parcels.GeoJSON", COLLECTION);
        let expected = LayerId::from("layer-parcels.geojson-0");
        assert_eq!(
            outcome,
            Ok(UploadOutcome::Created {
                layer_id: expected.clone()
            })
        );
        assert!(surface.source(&SourceId::from("source-parcels.geojson-0")).is_some());
        assert_eq!(surface.layer_visible(&fill_layer_id(&expected)), Some(true));
        assert_eq!(surface.layer_visible(&line_layer_id(&expected)), Some(true));

        let layer = layers.get(&expected);
        assert!(layer.is_some_and(|l| l.visible && l.name == "parcels.geojson"));
        assert!(layer.is_some_and(|l| l.color.len() == 7 && l.color.starts_with('#')));
    }

    #[test]
    fn reupload_updates_data_and_keeps_identity() {
        let (mut layers, mut surface) = setup();
        let _ = layers.upload(&mut surface, "a.geojson", COLLECTION);
        let before = layers.layers();
        let layer_id = LayerId::from("layer-a.geojson-0");
        assert!(layers.set_visibility(&mut surface, &layer_id, false));

        let outcome = layers.upload(&mut surface, "A.geojson", POLYGON);
        assert_eq!(
            outcome,
            Ok(UploadOutcome::DataUpdated {
                layer_id: layer_id.clone()
            })
        );

        let after = layers.layers();
        assert_eq!(after.len(), 1);
        let (old, new) = (before.first(), after.first());
        assert_eq!(old.map(|l| &l.color), new.map(|l| &l.color));
        assert_eq!(old.map(|l| &l.layer_id), new.map(|l| &l.layer_id));
        assert!(new.is_some_and(|l| !l.visible));

        let source = surface.source(&SourceId::from("source-a.geojson-0"));
        assert_eq!(
            source.and_then(|v| v.get("type")).and_then(Value::as_str),
            Some("Polygon")
        );
    }

    #[test]
    fn distinct_files_get_distinct_ids() {
        let (mut layers, mut surface) = setup();
        let _ = layers.upload(&mut surface, "a.geojson", COLLECTION);
        let _ = layers.upload(&mut surface, "b.geojson", COLLECTION);
        let ids: Vec<String> = layers
            .layers()
            .into_iter()
            .map(|l| l.layer_id.into_inner())
            .collect();
        assert_eq!(ids, vec!["layer-a.geojson-0", "layer-b.geojson-1"]);
    }

    #[test]
    fn unsupported_and_malformed_files_change_nothing() {
        let (mut layers, mut surface) = setup();
        assert!(matches!(
            layers.upload(&mut surface, "roads.kml", "<kml/>"),
            Err(ValidationError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            layers.upload(&mut surface, "roads.geojson", "{not json"),
            Err(ValidationError::MalformedDataset { .. })
        ));
        assert!(matches!(
            layers.upload(&mut surface, "roads.geojson", r#"{"type":"Banana"}"#),
            Err(ValidationError::MalformedDataset { .. })
        ));
        assert!(matches!(
            layers.upload(&mut surface, "roads.geojson", r#"{"type":"FeatureCollection"}"#),
            Err(ValidationError::MalformedDataset { .. })
        ));
        assert!(layers.layers().is_empty());
        assert!(surface.replay().is_empty());
    }

    #[test]
    fn visibility_is_noop_without_surface_layer() {
        let (mut layers, mut surface) = setup();
        assert!(!layers.set_visibility(&mut surface, &LayerId::from("layer-x-0"), false));

        let _ = layers.upload(&mut surface, "a.geojson", COLLECTION);
        let mut other_surface = CommandSurface::new(8);
        let layer_id = LayerId::from("layer-a.geojson-0");
        assert!(!layers.set_visibility(&mut other_surface, &layer_id, false));
        assert!(layers.get(&layer_id).is_some_and(|l| l.visible));

        assert!(layers.set_visibility(&mut surface, &layer_id, false));
        assert_eq!(surface.layer_visible(&fill_layer_id(&layer_id)), Some(false));
        assert!(layers.get(&layer_id).is_some_and(|l| !l.visible));
    }

    #[test]
    fn batch_upload_reports_each_file() {
        let (mut layers, mut surface) = setup();
        let files = vec![
            UploadFile {
                name: String::from("a.geojson"),
                contents: String::from(COLLECTION),
            },
            UploadFile {
                name: String::from("b.kml"),
                contents: String::new(),
            },
            UploadFile {
                name: String::from("a.geojson"),
                contents: String::from(POLYGON),
            },
        ];
        let reports: Vec<UploadReport> = layers
            .upload_all(&mut surface, &files)
            .iter()
            .map(|(name, result)| UploadReport::new(name.as_str(), result))
            .collect();
        assert_eq!(reports.len(), 3);
        assert!(matches!(
            reports.first().and_then(|r| r.outcome.clone()),
            Some(UploadOutcome::Created { .. })
        ));
        assert!(reports.get(1).is_some_and(|r| r.error.is_some() && r.file_name == "b.kml"));
        assert!(matches!(
            reports.get(2).and_then(|r| r.outcome.clone()),
            Some(UploadOutcome::DataUpdated { .. })
        ));
        assert_eq!(layers.layers().len(), 1);
    }

    #[test]
    fn colors_are_zero_padded() {
        for _ in 0..64 {
            let color = random_color();
            assert_eq!(color.len(), 7);
            assert!(color.chars().skip(1).all(|c| c.is_ascii_hexdigit()));
        }
    }
}

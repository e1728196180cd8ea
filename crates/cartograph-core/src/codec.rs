//! Flat string form of feature coordinates.
//!
//! Remote records store coordinates as a JSON string shaped like the
//! `GeoJSON` `coordinates` member of the geometry:
//!
//! | Kind | Stored form |
//! |------|-------------|
//! | Polygon | `[[[lng,lat],...]]` (list of rings, exterior first) |
//! | Point | `[lng,lat]` |
//! | Path | `[[lng,lat],...]` |
//!
//! The kind is stored next to the string, so decoding is unambiguous.
//! `serde_json` is built with `float_roundtrip`, which makes the
//! encode/decode pair lossless for every finite `f64`.

use cartograph_types::{Coordinate, Feature, Geometry, GeometryKind, RecordDraft, UserId};

use crate::geometry::round2;

/// Errors decoding or encoding stored coordinates.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The string is not valid JSON of the expected shape.
    #[error("invalid coordinate JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored polygon has no rings.
    #[error("polygon has no exterior ring")]
    MissingRing,
}

/// Serialize a geometry's coordinates to the stored string form.
pub fn encode(geometry: &Geometry) -> Result<String, CodecError> {
    let encoded = match geometry {
        Geometry::Polygon(ring) => serde_json::to_string(&[ring])?,
        Geometry::Point(point) => serde_json::to_string(point)?,
        Geometry::Path(points) => serde_json::to_string(points)?,
    };
    Ok(encoded)
}

/// Deserialize a stored coordinate string of the given kind.
///
/// Polygon interior rings are not modelled and are dropped.
pub fn decode(kind: GeometryKind, coordinates: &str) -> Result<Geometry, CodecError> {
    match kind {
        GeometryKind::Polygon => {
            let rings: Vec<Vec<Coordinate>> = serde_json::from_str(coordinates)?;
            rings
                .into_iter()
                .next()
                .map(Geometry::Polygon)
                .ok_or(CodecError::MissingRing)
        }
        GeometryKind::Point => Ok(Geometry::Point(serde_json::from_str(coordinates)?)),
        GeometryKind::Path => Ok(Geometry::Path(serde_json::from_str(coordinates)?)),
    }
}

/// Build the remote record body for a feature written on behalf of `owner`.
pub fn to_draft(feature: &Feature, owner: &UserId) -> Result<RecordDraft, CodecError> {
    Ok(RecordDraft {
        owner_id: owner.clone(),
        kind: feature.geometry.kind(),
        name: feature.name.clone(),
        size: round2(feature.derived.square_meters()),
        coordinates: encode(&feature.geometry)?,
        version: feature.version,
    })
}

//! Coordinate and geometry types.
//!
//! Coordinates are `[longitude, latitude]` pairs in WGS84 degrees, matching
//! the `GeoJSON` position order the render surface speaks. A [`Geometry`] is
//! owned by exactly one feature.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A `[longitude, latitude]` position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinate(pub f64, pub f64);

impl Coordinate {
    /// Create a coordinate from longitude and latitude.
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self(lng, lat)
    }

    /// Longitude in degrees.
    pub const fn lng(self) -> f64 {
        self.0
    }

    /// Latitude in degrees.
    pub const fn lat(self) -> f64 {
        self.1
    }

    /// Whether both components are finite numbers.
    pub const fn is_finite(self) -> bool {
        self.0.is_finite() && self.1.is_finite()
    }
}

/// The shape of a feature's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GeometryKind {
    /// A closed polygon ring.
    Polygon,
    /// A single point.
    Point,
    /// An ordered sequence of points.
    Path,
}

impl GeometryKind {
    /// Stable lowercase name used in remote records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Polygon => "polygon",
            Self::Point => "point",
            Self::Path => "path",
        }
    }

    /// Parse the name produced by [`GeometryKind::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "polygon" => Some(Self::Polygon),
            "point" => Some(Self::Point),
            "path" => Some(Self::Path),
            _ => None,
        }
    }
}

impl core::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry owned by a feature.
///
/// Serialized `GeoJSON`-style as `{"type": ..., "coordinates": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "coordinates")]
#[ts(export, export_to = "bindings/")]
pub enum Geometry {
    /// Exterior ring of a polygon. Stored closed: the last position equals
    /// the first.
    Polygon(Vec<Coordinate>),
    /// A single placed point.
    Point(Coordinate),
    /// An ordered point sequence. May hold zero or one points while the
    /// user is still building it.
    Path(Vec<Coordinate>),
}

impl Geometry {
    /// The kind of this geometry.
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::Point(_) => GeometryKind::Point,
            Self::Path(_) => GeometryKind::Path,
        }
    }

    /// All positions of the geometry in order.
    pub fn coordinates(&self) -> &[Coordinate] {
        match self {
            Self::Polygon(ring) | Self::Path(ring) => ring,
            Self::Point(point) => core::slice::from_ref(point),
        }
    }
}

/// An axis-aligned bounding box `[min_lng, min_lat, max_lng, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BoundingBox(pub f64, pub f64, pub f64, pub f64);

impl BoundingBox {
    /// Western edge.
    pub const fn min_lng(self) -> f64 {
        self.0
    }

    /// Southern edge.
    pub const fn min_lat(self) -> f64 {
        self.1
    }

    /// Eastern edge.
    pub const fn max_lng(self) -> f64 {
        self.2
    }

    /// Northern edge.
    pub const fn max_lat(self) -> f64 {
        self.3
    }
}

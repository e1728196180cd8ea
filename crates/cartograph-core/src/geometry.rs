//! Geometry validation and geodesic measurements.
//!
//! [`GeometryEngine`] is a stateless wrapper over the `geo` crate:
//!
//! | Measurement | Algorithm | Unit |
//! |-------------|-----------|------|
//! | Polygon area | Chamberlain-Duquette on the WGS84 sphere | m² |
//! | Segment length | Haversine great-circle distance | km |
//! | Bounding box | Axis-aligned min/max of all positions | degrees |
//!
//! [`normalize`] is the gate every geometry passes before it reaches the
//! feature store: it rejects non-finite positions and unfinished primitives
//! and closes polygon rings.

use cartograph_types::{BoundingBox, Coordinate, Geometry, GeometryKind, Measurements};
use geo::{BoundingRect, ChamberlainDuquetteArea, Distance, Haversine, LineString, Point, Polygon};

use crate::error::ValidationError;

/// Meters in one kilometer.
const METERS_PER_KM: f64 = 1000.0;

/// Minimum number of distinct vertices in a polygon ring.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Pure geodesic computations over coordinate data.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryEngine;

impl GeometryEngine {
    /// Geodesic area of a polygon ring in square meters.
    pub fn area(ring: &[Coordinate]) -> f64 {
        let exterior: LineString<f64> = ring.iter().map(|c| (c.lng(), c.lat())).collect();
        Polygon::new(exterior, Vec::new()).chamberlain_duquette_unsigned_area()
    }

    /// Great-circle length of each consecutive segment in kilometers.
    pub fn segment_lengths(points: &[Coordinate]) -> Vec<f64> {
        points
            .windows(2)
            .filter_map(|pair| match pair {
                [a, b] => Some(
                    Haversine::distance(Point::new(a.lng(), a.lat()), Point::new(b.lng(), b.lat()))
                        / METERS_PER_KM,
                ),
                _ => None,
            })
            .collect()
    }

    /// Total great-circle length of a point sequence in kilometers.
    pub fn length(points: &[Coordinate]) -> f64 {
        Self::segment_lengths(points).iter().sum()
    }

    /// Bounding box of all positions of a geometry, or `None` when it has
    /// no positions.
    pub fn bounding_box(geometry: &Geometry) -> Option<BoundingBox> {
        let line: LineString<f64> = geometry
            .coordinates()
            .iter()
            .map(|c| (c.lng(), c.lat()))
            .collect();
        line.bounding_rect().map(|rect| {
            BoundingBox(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        })
    }

    /// Compute the derived measurements for a geometry.
    pub fn measure(geometry: &Geometry) -> Measurements {
        match geometry {
            Geometry::Polygon(ring) => Measurements::Area {
                square_meters: Self::area(ring),
            },
            Geometry::Path(points) => {
                let segment_km = Self::segment_lengths(points);
                let total_km = segment_km.iter().sum();
                Measurements::Path {
                    segment_km,
                    total_km,
                }
            }
            Geometry::Point(_) => Measurements::None,
        }
    }
}

/// Round a measurement to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build a geometry of the given kind from raw surface coordinates and
/// normalize it.
pub fn from_parts(
    kind: GeometryKind,
    coordinates: Vec<Coordinate>,
) -> Result<Geometry, ValidationError> {
    let geometry = match kind {
        GeometryKind::Polygon => Geometry::Polygon(coordinates),
        GeometryKind::Path => Geometry::Path(coordinates),
        GeometryKind::Point => match coordinates.as_slice() {
            [single] => Geometry::Point(*single),
            [] => {
                return Err(ValidationError::IncompleteGeometry {
                    kind,
                    reason: String::from("a point needs one position"),
                });
            }
            _ => {
                return Err(ValidationError::IncompleteGeometry {
                    kind,
                    reason: format!("a point has one position, got {}", coordinates.len()),
                });
            }
        },
    };
    normalize(geometry)
}

/// Validate a geometry and bring it into canonical form.
///
/// Polygon rings are de-duplicated of consecutive repeats and closed.
/// A polygon with fewer than [`MIN_POLYGON_VERTICES`] distinct vertices is
/// still being drawn and is rejected as incomplete.
pub fn normalize(geometry: Geometry) -> Result<Geometry, ValidationError> {
    if let Some(index) = geometry.coordinates().iter().position(|c| !c.is_finite()) {
        return Err(ValidationError::NonFiniteCoordinate { index });
    }

    match geometry {
        Geometry::Polygon(ring) => close_ring(ring).map(Geometry::Polygon),
        other => Ok(other),
    }
}

fn close_ring(ring: Vec<Coordinate>) -> Result<Vec<Coordinate>, ValidationError> {
    let mut vertices: Vec<Coordinate> = Vec::with_capacity(ring.len().saturating_add(1));
    for coordinate in ring {
        if vertices.last() != Some(&coordinate) {
            vertices.push(coordinate);
        }
    }
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    if vertices.len() < MIN_POLYGON_VERTICES {
        return Err(ValidationError::IncompleteGeometry {
            kind: GeometryKind::Polygon,
            reason: format!(
                "{} distinct vertices, need at least {MIN_POLYGON_VERTICES}",
                vertices.len()
            ),
        });
    }

    if let Some(first) = vertices.first().copied() {
        vertices.push(first);
    }
    Ok(vertices)
}

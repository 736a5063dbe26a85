use rstar::AABB;
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord {
            x: c.longitude,
            y: c.latitude,
        }
    }
}

/// Axis-aligned latitude/longitude rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Minimal box around a coordinate sequence, computed in a single pass.
    /// Returns `None` for an empty sequence.
    pub fn around(coordinates: &[Coordinate]) -> Option<Self> {
        let first = coordinates.first()?;
        let mut bbox = Self::new(
            first.latitude,
            first.longitude,
            first.latitude,
            first.longitude,
        );

        for c in &coordinates[1..] {
            bbox.min_lat = bbox.min_lat.min(c.latitude);
            bbox.min_lon = bbox.min_lon.min(c.longitude);
            bbox.max_lat = bbox.max_lat.max(c.latitude);
            bbox.max_lon = bbox.max_lon.max(c.longitude);
        }

        Some(bbox)
    }

    /// Grows the box by `margin` degrees on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.min_lat - margin,
            self.min_lon - margin,
            self.max_lat + margin,
            self.max_lon + margin,
        )
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self::new(
            self.min_lat.min(other.min_lat),
            self.min_lon.min(other.min_lon),
            self.max_lat.max(other.max_lat),
            self.max_lon.max(other.max_lon),
        )
    }

    pub fn min_corner(&self) -> Coordinate {
        Coordinate::new(self.min_lat, self.min_lon)
    }

    pub fn max_corner(&self) -> Coordinate {
        Coordinate::new(self.max_lat, self.max_lon)
    }

    /// Containment with inclusive minimum and exclusive maximum edges.
    pub fn contains_half_open(&self, point: Coordinate) -> bool {
        point.latitude >= self.min_lat
            && point.latitude < self.max_lat
            && point.longitude >= self.min_lon
            && point.longitude < self.max_lon
    }

    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lat, self.min_lon], [self.max_lat, self.max_lon])
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] - [{}, {}]",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

/// Strict containment: a point lying on any edge of the box is outside.
pub fn point_in_box(point: Coordinate, bbox: &BoundingBox) -> bool {
    point.latitude > bbox.min_lat
        && point.latitude < bbox.max_lat
        && point.longitude > bbox.min_lon
        && point.longitude < bbox.max_lon
}

/// True when the boxes share any area or touch, or when a corner of one lies inside the other.
///
/// The corner tests are implied by the interval test for well-formed boxes; all five are
/// evaluated so degenerate (inverted or zero-width) boxes classify the same way from either side.
pub fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
    let intersect = !(a.min_lat > b.max_lat
        || a.max_lat < b.min_lat
        || a.min_lon > b.max_lon
        || a.max_lon < b.min_lon);
    let a_min_inside = point_in_box(a.min_corner(), b);
    let b_min_inside = point_in_box(b.min_corner(), a);
    let a_max_inside = point_in_box(a.max_corner(), b);
    let b_max_inside = point_in_box(b.max_corner(), a);

    intersect || a_min_inside || b_min_inside || a_max_inside || b_max_inside
}

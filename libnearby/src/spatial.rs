//! Distance computation and containment tests between points.
//!
//! Distances are great-circle (haversine) distances in meters on a sphere with
//! the mean radius of the WGS84 ellipsoid. Every store evaluates proximity with
//! the functions in this module, so a search answered through a database index
//! and one answered by scanning every record give identical results.
use crate::geometry::Point;
use geo::{Destination, Distance, Haversine};

/// Mean radius of the Earth in meters (IUGG), the radius used by [distance()]
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

// The envelope is widened by this much so that rounding in the exact test can
// never place a point inside the radius but outside the envelope.
const ENVELOPE_MARGIN: f64 = 1.0 + 1e-9;
const ENVELOPE_PADDING_DEGREES: f64 = 1e-9;

/// The distance in meters between two points along the Earth's surface.
///
/// The points are always evaluated in the same order, so the result is
/// bit-for-bit symmetric.
pub fn distance(a: Point, b: Point) -> f64 {
    let (first, second) = if (a.x(), a.y()) <= (b.x(), b.y()) {
        (a, b)
    } else {
        (b, a)
    };
    Haversine::distance(first, second)
}

/// Whether `candidate` lies within `radius` meters of `center`. A point at
/// exactly `radius` is inside. A radius that is not positive contains nothing.
pub fn within_radius(center: Point, radius: f64, candidate: Point) -> bool {
    Proximity::within(center, radius).measure(candidate).is_some()
}

/// Whether `candidate` lies between `min_distance` and `max_distance` meters of
/// `center`, both bounds inclusive
pub fn within_range(center: Point, min_distance: f64, max_distance: f64, candidate: Point) -> bool {
    Proximity::between(center, min_distance, max_distance)
        .measure(candidate)
        .is_some()
}

/// The point reached by travelling `meters` from `origin` along the initial
/// bearing `bearing` (degrees clockwise from north), on the same sphere as
/// [distance()]
pub fn destination(origin: Point, bearing: f64, meters: f64) -> Point {
    Haversine::destination(origin, bearing, meters)
}

/// A containment predicate: the ring between two distances around a center.
/// A plain radius search is a ring with a minimum distance of zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub center: Point,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl Proximity {
    pub fn within(center: Point, radius: f64) -> Self {
        Self::between(center, 0.0, radius)
    }

    pub fn between(center: Point, min_distance: f64, max_distance: f64) -> Self {
        Self {
            center,
            min_distance,
            max_distance,
        }
    }

    /// True if no point can satisfy this predicate: the maximum is not
    /// positive, or the minimum is larger than the maximum
    pub fn is_empty(&self) -> bool {
        !(self.max_distance > 0.0 && self.min_distance <= self.max_distance)
    }

    /// Returns the distance to `candidate` if it satisfies this predicate
    pub fn measure(&self, candidate: Point) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let d = distance(self.center, candidate);
        (d >= self.min_distance && d <= self.max_distance).then_some(d)
    }

    /// The envelope that must contain every matching point, or `None` if
    /// nothing can match
    pub fn envelope(&self) -> Option<BoundingBox> {
        if self.is_empty() {
            return None;
        }
        BoundingBox::around(self.center, self.max_distance)
    }
}

/// A latitude/longitude rectangle in degrees. When `west` is greater than
/// `east` the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    pub const WORLD: BoundingBox = BoundingBox {
        south: -90.0,
        north: 90.0,
        west: -180.0,
        east: 180.0,
    };

    /// The smallest box (plus a tiny safety margin) containing every point
    /// within `radius` meters of `center`. Returns `None` for a radius that is
    /// not positive.
    pub fn around(center: Point, radius: f64) -> Option<Self> {
        if !(radius > 0.0) {
            return None;
        }
        let angular = radius / EARTH_RADIUS_METERS * ENVELOPE_MARGIN;
        let lat = center.y().to_radians();
        let south = (lat - angular).to_degrees() - ENVELOPE_PADDING_DEGREES;
        let north = (lat + angular).to_degrees() + ENVELOPE_PADDING_DEGREES;

        // a pole inside the circle means every longitude is reachable
        if south <= -90.0 || north >= 90.0 {
            return Some(Self {
                south: south.max(-90.0),
                north: north.min(90.0),
                ..Self::WORLD
            });
        }

        let ratio = angular.sin() / lat.cos();
        if ratio >= 1.0 {
            return Some(Self {
                south,
                north,
                ..Self::WORLD
            });
        }
        let dlon = ratio.asin().to_degrees() + ENVELOPE_PADDING_DEGREES;
        if dlon >= 180.0 {
            return Some(Self {
                south,
                north,
                ..Self::WORLD
            });
        }
        let mut west = center.x() - dlon;
        let mut east = center.x() + dlon;
        if west < -180.0 {
            west += 360.0;
        }
        if east > 180.0 {
            east -= 360.0;
        }
        Some(Self {
            south,
            north,
            west,
            east,
        })
    }

    /// Whether the box crosses the antimeridian
    pub fn wraps(&self) -> bool {
        self.west > self.east
    }

    pub fn contains(&self, point: Point) -> bool {
        let (lon, lat) = (point.x(), point.y());
        if lat < self.south || lat > self.north {
            return false;
        }
        if self.wraps() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }
}

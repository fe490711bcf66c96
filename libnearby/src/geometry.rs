//! Conversions between the different representations of a position on the
//! Earth's surface.
//!
//! Internally a position is always a [Point] in (longitude, latitude) order,
//! which is the axis order used by GeoJSON, WKT and the database. Everything
//! facing a user speaks (latitude, longitude) instead, through [LatLng] or the
//! [from_lat_lng()] / [to_lat_lng()] pair. This module is the only place where
//! the two orders are swapped.
use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use wkt::{ToWkt, Wkt};

/// A position in WGS84 coordinates. `x` is the longitude and `y` is the latitude.
pub type Point = geo::Point<f64>;

/// The spatial reference identifier of WGS84, the only reference system used
/// by this library
pub const SRID_WGS84: i32 = 4326;

/// A position expressed in the (latitude, longitude) order that people use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are within the valid WGS84 bounds
    pub fn is_valid(&self) -> bool {
        validate(self.latitude, self.longitude)
    }

    /// Convert to a [Point] without checking the bounds
    pub fn to_point(self) -> Point {
        from_lat_lng(self.latitude, self.longitude)
    }

    /// Convert to a [Point], failing if either component is out of bounds
    pub fn try_to_point(self) -> Result<Point, ValidationError> {
        check(self.latitude, self.longitude)
    }
}

impl From<Point> for LatLng {
    fn from(point: Point) -> Self {
        let (latitude, longitude) = to_lat_lng(point);
        Self {
            latitude,
            longitude,
        }
    }
}

/// Build a point from a latitude and longitude. The point stores them swapped.
pub fn from_lat_lng(latitude: f64, longitude: f64) -> Point {
    Point::new(longitude, latitude)
}

/// Return the `(latitude, longitude)` of a point
pub fn to_lat_lng(point: Point) -> (f64, f64) {
    (point.y(), point.x())
}

/// Returns true if the latitude is within [-90, 90] and the longitude within
/// [-180, 180]. NaN is never valid.
pub fn validate(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Like [validate()], but reports which component is out of bounds and
/// returns the point on success
pub fn check(latitude: f64, longitude: f64) -> Result<Point, ValidationError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    Ok(from_lat_lng(latitude, longitude))
}

/// A GeoJSON `Point` geometry, serialized as
/// `{"type": "Point", "coordinates": [longitude, latitude]}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Point")]
pub struct GeoJsonPoint {
    pub coordinates: [f64; 2],
}

/// Convert a point to its GeoJSON geometry
pub fn to_geojson(point: Point) -> GeoJsonPoint {
    GeoJsonPoint {
        coordinates: [point.x(), point.y()],
    }
}

/// Convert a GeoJSON geometry back to a point
pub fn from_geojson(geojson: &GeoJsonPoint) -> Point {
    let [longitude, latitude] = geojson.coordinates;
    Point::new(longitude, latitude)
}

/// Returns true if `value` is a GeoJSON point with exactly two numeric
/// coordinates that are within the WGS84 bounds. Anything malformed simply
/// returns false.
pub fn validate_geojson(value: &Value) -> bool {
    geojson_coordinates(value).is_some_and(|(longitude, latitude)| validate(latitude, longitude))
}

/// Parse an untyped JSON value as a GeoJSON point, checking the structure and
/// the coordinate bounds
pub fn parse_geojson(value: &Value) -> Result<Point, ValidationError> {
    match value.get("type").and_then(Value::as_str) {
        Some("Point") => (),
        Some(other) => {
            return Err(ValidationError::GeoJson(format!(
                "geometry type must be Point, not {other}"
            )));
        }
        None => {
            return Err(ValidationError::GeoJson(
                "missing geometry type".to_string(),
            ));
        }
    }
    let (longitude, latitude) = geojson_coordinates(value).ok_or_else(|| {
        ValidationError::GeoJson("a point must have exactly 2 numeric coordinates".to_string())
    })?;
    check(latitude, longitude)
}

fn geojson_coordinates(value: &Value) -> Option<(f64, f64)> {
    if value.get("type")?.as_str()? != "Point" {
        return None;
    }
    match value.get("coordinates")?.as_array()?.as_slice() {
        [longitude, latitude] => Some((longitude.as_f64()?, latitude.as_f64()?)),
        _ => None,
    }
}

/// Format a point as Well-Known Text, e.g. `POINT(-74.006 40.7128)`. Floats are
/// written in their shortest round-trip form so no precision is lost.
pub fn to_wkt(point: Point) -> String {
    point.wkt_string()
}

/// Parse a Well-Known Text point. Keywords are case-insensitive and an
/// extended-WKT `SRID=4326;` prefix is accepted. Coordinates must be finite,
/// bounds are not checked.
pub fn from_wkt(text: &str) -> Result<Point, ValidationError> {
    let err = |msg: String| ValidationError::Wkt(format!("{msg}: '{text}'"));
    let upper = text.trim().to_ascii_uppercase();
    let body = match upper.split_once(';') {
        Some((srid, geometry)) => {
            let srid = srid
                .trim()
                .strip_prefix("SRID=")
                .ok_or_else(|| err("malformed SRID prefix".to_string()))?;
            if srid.trim().parse::<i32>() != Ok(SRID_WGS84) {
                return Err(err("only SRID 4326 is supported".to_string()));
            }
            geometry
        }
        None => upper.as_str(),
    };
    let parsed = Wkt::<f64>::from_str(body).map_err(|e| err(format!("{e:?}")))?;
    let point = Point::try_from(parsed).map_err(|e| err(format!("{e:?}")))?;
    if !(point.x().is_finite() && point.y().is_finite()) {
        return Err(err("coordinates must be finite".to_string()));
    }
    Ok(point)
}

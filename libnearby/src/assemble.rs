//! Response shapes for locations. Positions are reported as separate latitude
//! and longitude values, or as a GeoJSON geometry.
use crate::{
    geometry::{self, GeoJsonPoint},
    location::Location,
    plan::{Match, Matches},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Location> for LocationResponse {
    fn from(location: &Location) -> Self {
        let (latitude, longitude) = geometry::to_lat_lng(location.position);
        Self {
            id: location.id,
            name: location.name.clone(),
            description: location.description.clone(),
            latitude,
            longitude,
            created_at: location.created_at,
            updated_at: location.updated_at,
        }
    }
}

/// A location found by a proximity search, with its distance from the center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationWithDistance {
    #[serde(flatten)]
    pub location: LocationResponse,
    pub distance_meters: f64,
}

impl LocationWithDistance {
    pub fn new(location: &Location, distance_meters: f64) -> Self {
        Self {
            location: location.into(),
            distance_meters,
        }
    }
}

/// A single location with its position as a GeoJSON geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationGeoJson {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub geometry: GeoJsonPoint,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Location> for LocationGeoJson {
    fn from(location: &Location) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            description: location.description.clone(),
            geometry: geometry::to_geojson(location.position),
            created_at: location.created_at,
            updated_at: location.updated_at,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationList<T> {
    pub locations: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub has_next: bool,
}

impl<T> LocationList<T> {
    /// Convert every location on this page, keeping the paging details
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> LocationList<U> {
        LocationList {
            locations: self.locations.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            has_next: self.has_next,
        }
    }

    fn assemble<F: Fn(Match) -> Option<T>>(matches: Matches, convert: F) -> Self {
        Self {
            has_next: matches.has_next(),
            total: matches.total,
            page: matches.window.page(),
            per_page: matches.window.per_page(),
            locations: matches.items.into_iter().filter_map(convert).collect(),
        }
    }
}

/// Shape a page of matches as plain locations
pub fn locations(matches: Matches) -> LocationList<LocationResponse> {
    LocationList::assemble(matches, |m| Some((&m.location).into()))
}

/// Shape a page of matches from a proximity search. Every match of a
/// proximity plan carries a distance.
pub fn with_distances(matches: Matches) -> LocationList<LocationWithDistance> {
    LocationList::assemble(matches, |m| {
        m.distance
            .map(|d| LocationWithDistance::new(&m.location, d))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::from_lat_lng,
        location::NewLocation,
        plan::{QueryPlan, Window},
    };
    use serde_json::json;

    fn cafe() -> Location {
        let created = OffsetDateTime::from_unix_timestamp(1_751_360_400).unwrap();
        NewLocation::new(
            "Cafe A",
            Some("Test description".to_string()),
            from_lat_lng(40.7128, -74.0060),
        )
        .into_location(1, created)
    }

    #[test]
    fn test_response_shape() {
        let response = LocationResponse::from(&cafe());
        assert_eq!(response.latitude, 40.7128);
        assert_eq!(response.longitude, -74.0060);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "id": 1,
                "name": "Cafe A",
                "description": "Test description",
                "latitude": 40.7128,
                "longitude": -74.006,
                "created_at": "2025-07-01T09:00:00Z",
                "updated_at": "2025-07-01T09:00:00Z"
            })
        );
    }

    #[test]
    fn test_distance_is_flattened() {
        let value = serde_json::to_value(LocationWithDistance::new(&cafe(), 12.5)).unwrap();
        assert_eq!(value["distance_meters"], json!(12.5));
        assert_eq!(value["name"], json!("Cafe A"));
        assert_eq!(value["latitude"], json!(40.7128));
    }

    #[test]
    fn test_geojson_shape() {
        let value = serde_json::to_value(LocationGeoJson::from(&cafe())).unwrap();
        assert_eq!(
            value["geometry"],
            json!({"type": "Point", "coordinates": [-74.006, 40.7128]})
        );
    }

    #[test]
    fn test_lists() {
        let plan = QueryPlan::nearby(from_lat_lng(40.7128, -74.0060), 50.0)
            .build()
            .unwrap();
        let list = with_distances(plan.evaluate([cafe()]));
        assert_eq!(list.total, 1);
        assert_eq!(list.locations.len(), 1);
        assert_eq!(list.locations[0].distance_meters, 0.0);
        assert!(!list.has_next);
        assert_eq!((list.page, list.per_page), (1, 10));

        let names = list.map(|l| l.location.name);
        assert_eq!(names.locations, vec!["Cafe A".to_string()]);
        assert_eq!(names.total, 1);

        let empty = locations(Matches::empty(Window::new(3, 20).unwrap()));
        assert!(empty.locations.is_empty());
        assert_eq!((empty.page, empty.per_page, empty.total), (3, 20, 0));
    }
}

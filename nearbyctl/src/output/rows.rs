use libnearby::{
    assemble::{LocationGeoJson, LocationResponse, LocationWithDistance},
    geometry::GeoJsonPoint,
};
use serde::Serialize;
use tabled::Tabled;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

fn timestamp(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

fn display_geometry(geometry: &GeoJsonPoint) -> String {
    serde_json::to_string(geometry).unwrap_or_default()
}

#[derive(Tabled, Serialize)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct LocationRow {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
    #[tabled(display("tabled::derive::display::option", ""))]
    description: Option<String>,
}

impl LocationRow {
    pub(crate) fn new(location: &LocationResponse) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            description: location.description.clone(),
        }
    }
}

#[derive(Tabled, Serialize)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct LocationRowFull {
    id: i64,
    name: String,
    #[tabled(display("tabled::derive::display::option", ""))]
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    created: String,
    updated: String,
}

impl LocationRowFull {
    pub(crate) fn new(location: &LocationResponse) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            description: location.description.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            created: timestamp(location.created_at),
            updated: timestamp(location.updated_at),
        }
    }
}

#[derive(Tabled, Serialize)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct DistanceRow {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
    #[tabled(rename = "Distance (m)")]
    #[tabled(display = "display_meters")]
    distance_meters: f64,
}

fn display_meters(meters: &f64) -> String {
    format!("{meters:.1}")
}

impl DistanceRow {
    pub(crate) fn new(found: &LocationWithDistance) -> Self {
        Self {
            id: found.location.id,
            name: found.location.name.clone(),
            latitude: found.location.latitude,
            longitude: found.location.longitude,
            distance_meters: found.distance_meters,
        }
    }
}

#[derive(Tabled, Serialize)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct GeoJsonRow {
    id: i64,
    name: String,
    #[tabled(display("tabled::derive::display::option", ""))]
    description: Option<String>,
    #[tabled(display = "display_geometry")]
    geometry: GeoJsonPoint,
    created: String,
    updated: String,
}

impl GeoJsonRow {
    pub(crate) fn new(location: &LocationGeoJson) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            description: location.description.clone(),
            geometry: location.geometry,
            created: timestamp(location.created_at),
            updated: timestamp(location.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputFormat, format_one, format_seq};

    fn cafe() -> LocationResponse {
        let created = OffsetDateTime::from_unix_timestamp(1_751_360_400).unwrap();
        LocationResponse {
            id: 1,
            name: "Cafe A".to_string(),
            description: None,
            latitude: 40.7128,
            longitude: -74.006,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = format_seq([LocationRow::new(&cafe())], OutputFormat::Csv).unwrap();
        assert_eq!(
            csv,
            "id,name,latitude,longitude,description\n1,Cafe A,40.7128,-74.006,\n"
        );
    }

    #[test]
    fn test_json_row() {
        let json = format_one(LocationRowFull::new(&cafe()), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["created"], "2025-07-01T09:00:00Z");
        assert_eq!(value["latitude"], 40.7128);
        assert!(format_one(LocationRowFull::new(&cafe()), OutputFormat::Csv).is_err());
    }

    #[test]
    fn test_distance_display() {
        assert_eq!(display_meters(&27.9064), "27.9");
        let table = format_seq(
            [DistanceRow::new(&LocationWithDistance {
                location: cafe(),
                distance_meters: 1405.55,
            })],
            OutputFormat::Table,
        )
        .unwrap();
        assert!(table.contains("1405.5") || table.contains("1405.6"));
        assert!(table.contains("Distance (m)"));
    }
}

//! The operations offered to callers of this library. Every request is
//! validated completely before the store is touched.
use crate::{
    Error, Result,
    assemble::{self, LocationGeoJson, LocationList, LocationResponse, LocationWithDistance},
    core::query::SortOrder,
    dedup::{self, DEFAULT_TOLERANCE_METERS},
    geometry,
    location::{Location, NewLocation, SortField},
    plan::{DEFAULT_PER_PAGE, QueryPlan},
    store::LocationStore,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

/// A request to create a location from a latitude and longitude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLocation {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A request to create a location from a GeoJSON point geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLocationGeoJson {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub point: serde_json::Value,
}

/// Parameters for listing locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for LocationQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Descending,
        }
    }
}

/// Parameters for finding locations within a radius of a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbySearch {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl NearbySearch {
    pub fn new(latitude: f64, longitude: f64, radius_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_meters,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// Parameters for finding locations within a ring of distances around a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRangeQuery {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub min_distance_meters: f64,
    pub max_distance_meters: f64,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_range_sort")]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_range_sort() -> SortField {
    SortField::Distance
}

impl DistanceRangeQuery {
    pub fn new(latitude: f64, longitude: f64, min: f64, max: f64) -> Self {
        Self {
            latitude,
            longitude,
            min_distance_meters: min,
            max_distance_meters: max,
            search: None,
            sort_by: default_range_sort(),
            sort_order: SortOrder::Ascending,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// The location operations, on top of any [LocationStore]
#[derive(Debug)]
pub struct Service<S> {
    store: S,
    tolerance: f64,
    // serializes the check and the insert of create-if-absent within this process
    create_lock: Mutex<()>,
}

impl<S: LocationStore> Service<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tolerance: DEFAULT_TOLERANCE_METERS,
            create_lock: Mutex::new(()),
        }
    }

    /// Use a different distance, in meters, below which two locations are
    /// considered the same place
    pub fn with_tolerance(mut self, meters: f64) -> Self {
        self.tolerance = meters;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn create_location(&self, new: NewLocation) -> Result<(Location, bool)> {
        new.validate()?;
        let _guard = self.create_lock.lock().await;
        let (location, created) =
            dedup::create_if_absent(&self.store, new, self.tolerance).await?;
        if created {
            debug!(id = location.id, "created location '{}'", location.name);
        } else {
            debug!(id = location.id, "location already exists");
        }
        Ok((location, created))
    }

    /// Create a location unless one already exists within the dedup
    /// tolerance. Returns the stored location and whether it was created.
    pub async fn create(&self, request: CreateLocation) -> Result<(LocationResponse, bool)> {
        let position = geometry::check(request.latitude, request.longitude)?;
        let new = NewLocation::new(request.name, request.description, position);
        let (location, created) = self.create_location(new).await?;
        Ok(((&location).into(), created))
    }

    /// Like [Service::create()] but with the position given as a GeoJSON point
    pub async fn create_geojson(
        &self,
        request: CreateLocationGeoJson,
    ) -> Result<(LocationGeoJson, bool)> {
        let position = geometry::parse_geojson(&request.point)?;
        let new = NewLocation::new(request.name, request.description, position);
        let (location, created) = self.create_location(new).await?;
        Ok(((&location).into(), created))
    }

    async fn load(&self, id: i64) -> Result<Location> {
        self.store.get_by_id(id).await?.ok_or(Error::NotFound(id))
    }

    pub async fn get(&self, id: i64) -> Result<LocationResponse> {
        Ok((&self.load(id).await?).into())
    }

    pub async fn get_geojson(&self, id: i64) -> Result<LocationGeoJson> {
        Ok((&self.load(id).await?).into())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_by_id(id).await? {
            return Err(Error::NotFound(id));
        }
        debug!(id, "deleted location");
        Ok(())
    }

    /// Locations within a radius of a point, nearest first
    pub async fn nearby(&self, request: &NearbySearch) -> Result<LocationList<LocationWithDistance>> {
        let center = geometry::check(request.latitude, request.longitude)?;
        let plan = QueryPlan::nearby(center, request.radius_meters)
            .page(request.page, request.per_page)
            .build()?;
        let matches = self.store.query_by_predicate(&plan).await?;
        Ok(assemble::with_distances(matches))
    }

    pub async fn list(&self, query: &LocationQuery) -> Result<LocationList<LocationResponse>> {
        let plan = QueryPlan::list()
            .search(query.search.as_deref())
            .sort(query.sort_by, query.sort_order)
            .page(query.page, query.per_page)
            .build()?;
        let matches = self.store.query_by_predicate(&plan).await?;
        Ok(assemble::locations(matches))
    }

    /// Locations whose distance from a point lies within an inclusive range
    pub async fn range(
        &self,
        query: &DistanceRangeQuery,
    ) -> Result<LocationList<LocationWithDistance>> {
        let center = geometry::check(query.latitude, query.longitude)?;
        let plan = QueryPlan::range(center, query.min_distance_meters, query.max_distance_meters)
            .search(query.search.as_deref())
            .sort(query.sort_by, query.sort_order)
            .page(query.page, query.per_page)
            .build()?;
        let matches = self.store.query_by_predicate(&plan).await?;
        Ok(assemble::with_distances(matches))
    }

    pub async fn count(&self) -> Result<i64> {
        self.store.count_all().await
    }
}

//! The storage contract for locations and an in-memory implementation of it
use crate::{
    core::error::Result,
    geometry::Point,
    location::{self, Location, NewLocation},
    plan::{Matches, QueryPlan},
    spatial,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::trace;

/// The operations that the rest of the library needs from a location store.
/// Every implementation must return identical results for the same plan
/// over the same data.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Persist a new location, assigning it a fresh id and timestamps
    async fn insert(&self, location: NewLocation) -> Result<Location>;

    /// Fetch a location by its id
    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// Remove a location. Returns true if it existed.
    async fn delete_by_id(&self, id: i64) -> Result<bool>;

    /// The total number of stored locations
    async fn count_all(&self) -> Result<i64>;

    /// Execute a query plan, returning one page of matches and the total
    /// number of matches
    async fn query_by_predicate(&self, plan: &QueryPlan) -> Result<Matches>;

    /// The ids of all locations within `radius` meters of `center`, in
    /// ascending order
    async fn distance_index_lookup(&self, center: Point, radius: f64) -> Result<Vec<i64>>;
}

#[derive(Debug)]
struct MemoryInner {
    next_id: i64,
    locations: BTreeMap<i64, Location>,
}

impl Default for MemoryInner {
    fn default() -> Self {
        Self {
            next_id: 1,
            locations: BTreeMap::new(),
        }
    }
}

/// A [LocationStore] that keeps everything in memory and answers proximity
/// queries by checking every location
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn insert(&self, location: NewLocation) -> Result<Location> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let location = location.into_location(id, location::now());
        inner.locations.insert(id, location.clone());
        trace!(id, "inserted location into memory store");
        Ok(location)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        Ok(self.inner.read().await.locations.get(&id).cloned())
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        Ok(self.inner.write().await.locations.remove(&id).is_some())
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.inner.read().await.locations.len() as i64)
    }

    async fn query_by_predicate(&self, plan: &QueryPlan) -> Result<Matches> {
        let inner = self.inner.read().await;
        Ok(plan.evaluate(inner.locations.values().cloned()))
    }

    async fn distance_index_lookup(&self, center: Point, radius: f64) -> Result<Vec<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .locations
            .values()
            .filter(|l| spatial::within_radius(center, radius, l.position))
            .map(|l| l.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::from_lat_lng;
    use test_log::test;

    #[test(tokio::test)]
    async fn test_ids_are_never_reused() {
        let store = MemoryStore::new();
        let a = store
            .insert(NewLocation::new("A", None, from_lat_lng(1.0, 1.0)))
            .await
            .unwrap();
        let b = store
            .insert(NewLocation::new("B", None, from_lat_lng(2.0, 2.0)))
            .await
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(store.delete_by_id(2).await.unwrap());
        assert!(!store.delete_by_id(2).await.unwrap());
        let c = store
            .insert(NewLocation::new("C", None, from_lat_lng(3.0, 3.0)))
            .await
            .unwrap();
        assert_eq!(c.id, 3);
        assert_eq!(store.count_all().await.unwrap(), 2);
        assert_eq!(store.get_by_id(1).await.unwrap(), Some(a));
        assert_eq!(store.get_by_id(2).await.unwrap(), None);
    }

    #[test(tokio::test)]
    async fn test_distance_index_lookup() {
        let store = MemoryStore::new();
        for (name, lat, lng) in [
            ("Starbucks", 40.7128, -74.0060),
            ("Dunkin Coffee", 40.7130, -74.0062),
            ("Battery Park", 40.7033, -74.0170),
        ] {
            store
                .insert(NewLocation::new(name, None, from_lat_lng(lat, lng)))
                .await
                .unwrap();
        }
        let center = from_lat_lng(40.7128, -74.0060);
        assert_eq!(
            store.distance_index_lookup(center, 10.0).await.unwrap(),
            vec![1]
        );
        assert_eq!(
            store.distance_index_lookup(center, 100.0).await.unwrap(),
            vec![1, 2]
        );
        assert!(
            store
                .distance_index_lookup(center, 0.0)
                .await
                .unwrap()
                .is_empty()
        );
    }
}

//! Creating a location only when nothing is already stored at (nearly) the
//! same position
use crate::{
    Result,
    location::{Location, NewLocation},
    store::LocationStore,
};
use tracing::debug;

/// Locations closer together than this many meters are considered duplicates
pub const DEFAULT_TOLERANCE_METERS: f64 = 10.0;

/// Insert `location` unless a stored location lies within `tolerance` meters
/// of its position. Returns the stored location and whether it was created by
/// this call. When several locations lie within the tolerance, the one with
/// the lowest id is returned.
///
/// The check and the insert are two separate store operations. Callers that
/// need the pair to be atomic must serialize calls themselves, see
/// [crate::service::Service].
pub async fn create_if_absent<S: LocationStore + ?Sized>(
    store: &S,
    location: NewLocation,
    tolerance: f64,
) -> Result<(Location, bool)> {
    let nearby = store
        .distance_index_lookup(location.position, tolerance)
        .await?;
    for id in nearby {
        // a concurrent delete may have removed it since the lookup
        if let Some(existing) = store.get_by_id(id).await? {
            debug!(id, "found an existing location within {tolerance}m");
            return Ok((existing, false));
        }
    }
    let created = store.insert(location).await?;
    Ok((created, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::from_lat_lng, spatial::destination, store::MemoryStore};
    use test_log::test;

    #[test(tokio::test)]
    async fn test_create_if_absent() {
        let store = MemoryStore::new();
        let origin = from_lat_lng(40.7128, -74.0060);
        let (first, created) = create_if_absent(
            &store,
            NewLocation::new("Cafe A", None, origin),
            DEFAULT_TOLERANCE_METERS,
        )
        .await
        .unwrap();
        assert!(created);

        // 5m away is a duplicate, the stored location is returned untouched
        let (again, created) = create_if_absent(
            &store,
            NewLocation::new("Cafe B", None, destination(origin, 90.0, 5.0)),
            DEFAULT_TOLERANCE_METERS,
        )
        .await
        .unwrap();
        assert!(!created);
        assert_eq!(again, first);

        // 50m away is a different place
        let (other, created) = create_if_absent(
            &store,
            NewLocation::new("Cafe C", None, destination(origin, 90.0, 50.0)),
            DEFAULT_TOLERANCE_METERS,
        )
        .await
        .unwrap();
        assert!(created);
        assert_ne!(other.id, first.id);
        assert_eq!(store.count_all().await.unwrap(), 2);
    }

    #[test(tokio::test)]
    async fn test_lowest_id_wins() {
        let store = MemoryStore::new();
        let origin = from_lat_lng(10.0, 10.0);
        for name in ["first", "second"] {
            store
                .insert(NewLocation::new(name, None, origin))
                .await
                .unwrap();
        }
        let (existing, created) =
            create_if_absent(&store, NewLocation::new("third", None, origin), 1.0)
                .await
                .unwrap();
        assert!(!created);
        assert_eq!(existing.id, 1);
    }

    #[test(tokio::test)]
    async fn test_zero_tolerance_always_inserts() {
        let store = MemoryStore::new();
        let origin = from_lat_lng(10.0, 10.0);
        for _ in 0..2 {
            let (_, created) =
                create_if_absent(&store, NewLocation::new("same", None, origin), 0.0)
                    .await
                    .unwrap();
            assert!(created);
        }
    }
}

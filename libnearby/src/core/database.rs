use crate::{
    Result,
    core::query::{DynFilterPart, filter::and},
    geometry::Point,
    location::{Filter, Location, NewLocation},
    plan::{Match, Matches, QueryPlan},
    spatial::{self, BoundingBox},
    store::LocationStore,
};
use async_trait::async_trait;
use sqlx::{
    Pool, Row, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr};
use tracing::{debug, trace};

/// An object that represents a connection to the location database
#[derive(Clone, Debug)]
pub struct Database(Pool<Sqlite>);

impl From<Pool<Sqlite>> for Database {
    /// **WARNING**: This is primarily intended for tests. You should probably
    /// use [Database::open()] instead of creating the pool yourself, since
    /// [Database::open()] will perform database schema migration automatically.
    fn from(value: Pool<Sqlite>) -> Self {
        Self(value)
    }
}

impl Database {
    /// Open a connection to the specified database, creating it if it doesn't
    /// exist yet. This will also perform any necessary sql migrations to
    /// ensure that the database is up to date with the latest schema changes.
    pub async fn open<P: AsRef<Path>>(db: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db)
            .create_if_missing(true);
        let dbpool = SqlitePool::connect_with(options).await?;
        Self::migrate(dbpool).await
    }

    /// Open a private database that only lives as long as this object
    pub async fn open_in_memory() -> Result<Self> {
        // every connection to :memory: is a separate database, so keep exactly one
        let dbpool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        Self::migrate(dbpool).await
    }

    async fn migrate(dbpool: Pool<Sqlite>) -> Result<Self> {
        trace!("Running database migrations");
        sqlx::migrate!("../db/migrations").run(&dbpool).await?;
        Ok(Database(dbpool))
    }

    /// gets a reference to the underlying sqlx connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.0
    }

    async fn query_envelope(
        &self,
        bbox: BoundingBox,
        search: Option<&str>,
    ) -> Result<Vec<Location>> {
        let mut filter = and().push(Filter::Envelope(bbox));
        if let Some(text) = search {
            filter = filter.push(Filter::search(text));
        }
        Location::load_all(Some(filter.build()), None, None, self).await
    }
}

#[async_trait]
impl LocationStore for Database {
    async fn insert(&self, location: NewLocation) -> Result<Location> {
        let location = Location::insert(location, self).await?;
        trace!(id = location.id, "inserted location");
        Ok(location)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        Location::fetch(id, self).await
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        Ok(Location::delete_id(id, self).await?.rows_affected() > 0)
    }

    async fn count_all(&self) -> Result<i64> {
        Location::count(None, self).await
    }

    async fn query_by_predicate(&self, plan: &QueryPlan) -> Result<Matches> {
        if let Some(proximity) = plan.proximity() {
            // The envelope narrows the candidates with the position index. The
            // exact distance test and the ordering happen in the plan.
            let Some(bbox) = proximity.envelope() else {
                return Ok(Matches::empty(plan.window()));
            };
            let candidates = self.query_envelope(bbox, plan.search()).await?;
            debug!(
                candidates = candidates.len(),
                ?bbox,
                "evaluating proximity candidates"
            );
            return Ok(plan.evaluate(candidates));
        }

        let filter: Option<DynFilterPart> = plan.search().map(Filter::search);
        // count and page come from the same snapshot
        let mut tx = self.pool().begin().await?;
        let total: i64 = Location::build_count(filter.clone())
            .build()
            .fetch_one(&mut *tx)
            .await?
            .try_get("nlocations")?;
        let mut qb = Location::build_query(filter);
        Location::push_order(&mut qb, plan.sql_sort(), Some(plan.window().to_limit()));
        let rows: Vec<Location> = qb.build_query_as().fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(Matches {
            items: rows
                .into_iter()
                .map(|location| Match {
                    location,
                    distance: None,
                })
                .collect(),
            total: total as u64,
            window: plan.window(),
        })
    }

    async fn distance_index_lookup(&self, center: Point, radius: f64) -> Result<Vec<i64>> {
        let Some(bbox) = BoundingBox::around(center, radius) else {
            return Ok(Vec::new());
        };
        let mut ids: Vec<i64> = self
            .query_envelope(bbox, None)
            .await?
            .into_iter()
            .filter(|l| spatial::within_radius(center, radius, l.position))
            .map(|l| l.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::query::SortOrder,
        geometry::from_lat_lng,
        location::SortField,
        spatial::destination,
        store::MemoryStore,
    };
    use test_log::test;

    fn ids(matches: &Matches) -> Vec<i64> {
        matches.items.iter().map(|m| m.location.id).collect()
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../../db/fixtures", scripts("locations"))
    ))]
    async fn test_nearby(pool: Pool<Sqlite>) {
        let db = Database::from(pool);
        let center = from_lat_lng(40.7128, -74.0060);
        let plan = QueryPlan::nearby(center, 100.0).build().unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![1, 2, 3]);
        assert_eq!(found.total, 3);
        assert_eq!(found.items[0].distance, Some(0.0));

        let plan = QueryPlan::nearby(center, 1500.0)
            .page(2, 2)
            .build()
            .unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![3, 4]);
        assert_eq!(found.total, 4);
        assert!(!found.has_next());
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../../db/fixtures", scripts("locations"))
    ))]
    async fn test_range(pool: Pool<Sqlite>) {
        let db = Database::from(pool);
        let center = from_lat_lng(40.7128, -74.0060);
        let plan = QueryPlan::range(center, 30.0, 1500.0).build().unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![3, 4]);
        for Match { distance, .. } in &found.items {
            let d = distance.unwrap();
            assert!((30.0..=1500.0).contains(&d));
        }

        let plan = QueryPlan::range(center, 1500.0, 30.0).build().unwrap();
        assert_eq!(db.query_by_predicate(&plan).await.unwrap().total, 0);
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../../db/fixtures", scripts("locations"))
    ))]
    async fn test_list(pool: Pool<Sqlite>) {
        let db = Database::from(pool);
        let plan = QueryPlan::list().build().unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![5, 4, 3, 2, 1]);
        assert_eq!(found.total, 5);
        assert!(found.items.iter().all(|m| m.distance.is_none()));

        let plan = QueryPlan::list()
            .search(Some("coffee"))
            .sort(SortField::Name, SortOrder::Ascending)
            .page(1, 2)
            .build()
            .unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![5, 2]);
        assert_eq!(found.total, 3);
        assert!(found.has_next());

        // the last page is short and a page past the end is empty, but both
        // still report the full count
        let plan = QueryPlan::list().page(2, 3).build().unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![2, 1]);
        assert_eq!(found.total, 5);
        assert!(!found.has_next());

        let plan = QueryPlan::list().page(4, 2).build().unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert!(found.items.is_empty());
        assert_eq!(found.total, 5);
        assert_eq!(found.window.page(), 4);
        assert!(!found.has_next());
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../../db/fixtures", scripts("locations"))
    ))]
    async fn test_distance_index_lookup(pool: Pool<Sqlite>) {
        let db = Database::from(pool);
        let center = from_lat_lng(40.7128, -74.0060);
        assert_eq!(db.distance_index_lookup(center, 10.0).await.unwrap(), vec![1]);
        assert_eq!(
            db.distance_index_lookup(center, 30.0).await.unwrap(),
            vec![1, 2]
        );
        assert!(db.distance_index_lookup(center, 0.0).await.unwrap().is_empty());
    }

    #[test(sqlx::test(migrations = "../db/migrations/"))]
    async fn test_antimeridian(pool: Pool<Sqlite>) {
        let db = Database::from(pool);
        let east = db
            .insert(NewLocation::new("East", None, from_lat_lng(0.0, 179.9999)))
            .await
            .unwrap();
        let west = db
            .insert(NewLocation::new("West", None, from_lat_lng(0.0, -179.9999)))
            .await
            .unwrap();
        let plan = QueryPlan::nearby(from_lat_lng(0.0, 180.0), 100.0)
            .sort(SortField::Name, SortOrder::Ascending)
            .build()
            .unwrap();
        let found = db.query_by_predicate(&plan).await.unwrap();
        assert_eq!(ids(&found), vec![east.id, west.id]);
    }

    // Both stores must agree on every plan, including points placed right on
    // the edge of a search radius.
    #[test(tokio::test)]
    async fn test_stores_agree() {
        let db = Database::open_in_memory().await.unwrap();
        let memory = MemoryStore::new();
        let center = from_lat_lng(51.5007, -0.1246);
        let mut n = 0;
        for bearing in (0..360).step_by(15) {
            for meters in [0.0, 99.999, 100.0, 250.0, 999.0, 1000.0, 1000.001, 4000.0] {
                n += 1;
                let new = NewLocation::new(
                    format!("P{:03}", n % 7),
                    Some(format!("bearing {bearing}")),
                    destination(center, bearing as f64, meters),
                );
                db.insert(new.clone()).await.unwrap();
                memory.insert(new).await.unwrap();
            }
        }
        assert_eq!(db.count_all().await.unwrap(), memory.count_all().await.unwrap());

        let plans = [
            QueryPlan::nearby(center, 100.0).build().unwrap(),
            QueryPlan::nearby(center, 1000.0).page(2, 25).build().unwrap(),
            QueryPlan::range(center, 250.0, 1000.0).build().unwrap(),
            QueryPlan::range(center, 100.0, 4000.0)
                .sort(SortField::Name, SortOrder::Descending)
                .page(3, 10)
                .build()
                .unwrap(),
            QueryPlan::nearby(center, 5000.0)
                .search(Some("bearing 9"))
                .build()
                .unwrap(),
            QueryPlan::list()
                .sort(SortField::Name, SortOrder::Ascending)
                .page(4, 13)
                .build()
                .unwrap(),
        ];
        for plan in &plans {
            let from_db = db.query_by_predicate(plan).await.unwrap();
            let from_memory = memory.query_by_predicate(plan).await.unwrap();
            assert_eq!(from_db.total, from_memory.total, "{plan:?}");
            assert_eq!(ids(&from_db), ids(&from_memory), "{plan:?}");
            let bits = |m: &Matches| -> Vec<Option<u64>> {
                m.items.iter().map(|m| m.distance.map(f64::to_bits)).collect()
            };
            assert_eq!(bits(&from_db), bits(&from_memory), "{plan:?}");
        }
        for radius in [10.0, 100.0, 1000.0] {
            assert_eq!(
                db.distance_index_lookup(center, radius).await.unwrap(),
                memory.distance_index_lookup(center, radius).await.unwrap()
            );
        }
    }
}

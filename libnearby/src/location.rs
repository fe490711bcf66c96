//! Objects to manage named places on the Earth's surface
use crate::{
    core::{
        database::Database,
        error::{Error, Result, ValidationError},
        query::{
            DynFilterPart, LimitSpec, SortOrder, SortSpec, SortSpecs, ToSql, contains_pattern,
            filter::{Cmp, FilterPart, or},
        },
    },
    geometry::{self, Point},
    spatial::BoundingBox,
};
use serde::{Deserialize, Serialize};
use sqlx::{
    FromRow, QueryBuilder, Row, Sqlite,
    sqlite::{SqliteQueryResult, SqliteRow},
};
use strum_macros::{Display, EnumString};
use time::OffsetDateTime;

/// The longest name a location may have, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// A type for specifying fields that can be used for filtering a database query
/// for locations
#[derive(Clone, Debug)]
pub enum Filter {
    /// Compare the ID of the location to the given value
    Id(Cmp, i64),

    /// Compare the name of the location to the given value
    Name(Cmp, String),

    /// Compare the description of the location to the given value
    Description(Cmp, String),

    /// Match locations whose position lies inside the given envelope
    Envelope(BoundingBox),
}

impl Filter {
    /// A case-insensitive substring match against either the name or the
    /// description of a location
    pub fn search(text: &str) -> DynFilterPart {
        or().push(Filter::Name(Cmp::Like, text.to_string()))
            .push(Filter::Description(Cmp::Like, text.to_string()))
            .build()
    }
}

fn push_text_comparison(
    builder: &mut QueryBuilder<Sqlite>,
    column: &str,
    cmp: &Cmp,
    frag: &str,
) {
    builder.push(column);
    match cmp {
        Cmp::Like => {
            builder
                .push(cmp)
                .push_bind(contains_pattern(frag))
                .push(" ESCAPE '\\'");
        }
        _ => {
            builder.push(cmp).push_bind(frag.to_string());
        }
    }
}

impl FilterPart for Filter {
    fn add_to_query(&self, builder: &mut QueryBuilder<Sqlite>) {
        match self {
            Self::Id(cmp, id) => {
                builder.push(" L.id").push(cmp).push_bind(*id);
            }
            Self::Name(cmp, frag) => push_text_comparison(builder, " L.name", cmp, frag),
            Self::Description(cmp, frag) => {
                push_text_comparison(builder, " L.description", cmp, frag)
            }
            Self::Envelope(bbox) => {
                builder
                    .push(" (L.latitude BETWEEN ")
                    .push_bind(bbox.south)
                    .push(" AND ")
                    .push_bind(bbox.north);
                if bbox.wraps() {
                    builder
                        .push(" AND (L.longitude >= ")
                        .push_bind(bbox.west)
                        .push(" OR L.longitude <= ")
                        .push_bind(bbox.east)
                        .push(")");
                } else if bbox.west > -180.0 || bbox.east < 180.0 {
                    builder
                        .push(" AND L.longitude BETWEEN ")
                        .push_bind(bbox.west)
                        .push(" AND ")
                        .push_bind(bbox.east);
                }
                builder.push(")");
            }
        }
    }
}

/// The fields that search results can be sorted by
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    #[default]
    CreatedAt,
    /// Distance from the center of a proximity search. Not a stored column.
    Distance,
}

/// Stored columns that a database query can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Name,
    CreatedAt,
}

impl Column {
    /// The column backing a sort field, if there is one
    pub fn for_field(field: SortField) -> Option<Self> {
        match field {
            SortField::Name => Some(Self::Name),
            SortField::CreatedAt => Some(Self::CreatedAt),
            SortField::Distance => None,
        }
    }
}

impl ToSql for Column {
    fn to_sql(&self) -> String {
        match self {
            Self::Id => "L.id",
            Self::Name => "L.name",
            Self::CreatedAt => "L.created_at",
        }
        .into()
    }
}

/// A named place on the Earth's surface, as stored in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// A unique ID assigned by the store. IDs are never reused.
    pub id: i64,

    /// The name of the location
    pub name: String,

    /// An optional longer description of this location
    pub description: Option<String>,

    /// The position of the location in (longitude, latitude) order
    pub position: Point,

    /// When the location was created
    pub created_at: OffsetDateTime,

    /// When the location was last modified
    pub updated_at: OffsetDateTime,
}

impl FromRow<'_, SqliteRow> for Location {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            position: Point::new(row.try_get("longitude")?, row.try_get("latitude")?),
            created_at: decode_timestamp(row, "created_at")?,
            updated_at: decode_timestamp(row, "updated_at")?,
        })
    }
}

fn decode_timestamp(row: &SqliteRow, column: &str) -> sqlx::Result<OffsetDateTime> {
    let nanos: i64 = row.try_get(column)?;
    OffsetDateTime::from_unix_timestamp_nanos(nanos.into()).map_err(|e| {
        sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        }
    })
}

// i64 nanoseconds cover every instant until the year 2262
fn encode_timestamp(timestamp: OffsetDateTime) -> i64 {
    timestamp.unix_timestamp_nanos() as i64
}

/// The values needed to create a new location. The store assigns the id and
/// the timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub name: String,
    pub description: Option<String>,
    pub position: Point,
}

impl NewLocation {
    pub fn new<S: Into<String>>(name: S, description: Option<String>, position: Point) -> Self {
        Self {
            name: name.into(),
            description,
            position,
        }
    }

    /// Check the name and the coordinate bounds
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let len = self.name.chars().count();
        if len > MAX_NAME_LENGTH {
            return Err(ValidationError::NameTooLong(len));
        }
        let (latitude, longitude) = geometry::to_lat_lng(self.position);
        geometry::check(latitude, longitude).map(|_| ())
    }

    /// Turn this into a stored location with the given id, created now
    pub(crate) fn into_location(self, id: i64, now: OffsetDateTime) -> Location {
        Location {
            id,
            name: self.name,
            description: self.description,
            position: self.position,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The current time, truncated to what the database can represent
pub(crate) fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    OffsetDateTime::from_unix_timestamp_nanos(encode_timestamp(now).into()).unwrap_or(now)
}

impl Location {
    pub(crate) fn build_query(filter: Option<DynFilterPart>) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(
            r#"SELECT L.id, L.name, L.description, L.longitude, L.latitude,
            L.created_at, L.updated_at FROM locations L"#,
        );
        if let Some(f) = filter {
            qb.push(" WHERE ");
            f.add_to_query(&mut qb);
        }
        qb
    }

    pub(crate) fn build_count(filter: Option<DynFilterPart>) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) as nlocations FROM locations L");
        if let Some(f) = filter {
            qb.push(" WHERE ");
            f.add_to_query(&mut qb);
        }
        qb
    }

    /// Append an ordering to a query. The id is always the final key so that
    /// rows that compare equal are returned in a stable order.
    pub(crate) fn push_order(
        qb: &mut QueryBuilder<'static, Sqlite>,
        sort: Option<SortSpec<Column>>,
        limit: Option<LimitSpec>,
    ) {
        let mut specs = SortSpecs(sort.into_iter().collect());
        specs.0.push(SortSpec::new(Column::Id, SortOrder::Ascending));
        qb.push(" ");
        qb.push(specs.to_sql());
        if let Some(limit) = limit {
            qb.push(" ");
            qb.push(limit.to_sql());
        }
    }

    /// Load a single location from the database
    pub async fn load(id: i64, db: &Database) -> Result<Self> {
        Self::fetch(id, db).await?.ok_or(Error::NotFound(id))
    }

    /// Load a single location from the database, returning `None` if it doesn't exist
    pub async fn fetch(id: i64, db: &Database) -> Result<Option<Self>> {
        Self::build_query(Some(Filter::Id(Cmp::Equal, id).into()))
            .build_query_as()
            .fetch_optional(db.pool())
            .await
            .map_err(|e| e.into())
    }

    /// Loads all matching locations from the database
    pub async fn load_all(
        filter: Option<DynFilterPart>,
        sort: Option<SortSpec<Column>>,
        limit: Option<LimitSpec>,
        db: &Database,
    ) -> Result<Vec<Location>> {
        let mut qb = Self::build_query(filter);
        Self::push_order(&mut qb, sort, limit);
        qb.build_query_as()
            .fetch_all(db.pool())
            .await
            .map_err(|e| e.into())
    }

    /// Count the matching locations in the database
    pub async fn count(filter: Option<DynFilterPart>, db: &Database) -> Result<i64> {
        Self::build_count(filter)
            .build()
            .fetch_one(db.pool())
            .await?
            .try_get("nlocations")
            .map_err(|e| e.into())
    }

    /// Add a new location to the database and return it with its assigned id
    pub async fn insert(new: NewLocation, db: &Database) -> Result<Location> {
        let now = now();
        let stamp = encode_timestamp(now);
        let res = sqlx::query(
            r#"INSERT INTO locations
          (name, description, longitude, latitude, created_at, updated_at)
          VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.position.x())
        .bind(new.position.y())
        .bind(stamp)
        .bind(stamp)
        .execute(db.pool())
        .await?;
        Ok(new.into_location(res.last_insert_rowid(), now))
    }

    /// Remove the location with the given id from the database
    pub async fn delete_id(id: i64, db: &Database) -> Result<SqliteQueryResult> {
        sqlx::query("DELETE FROM locations WHERE id=?")
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(|e| e.into())
    }

    /// Whether this location matches a case-insensitive substring search on
    /// its name or description. Like SQLite's `LIKE`, only ASCII letters are
    /// folded.
    pub fn matches_search(&self, text: &str) -> bool {
        let needle = text.to_ascii_lowercase();
        self.name.to_ascii_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_ascii_lowercase().contains(&needle))
    }
}

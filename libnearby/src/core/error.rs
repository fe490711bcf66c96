//! Objects related to reporting errors from this library

/// Reasons why a request was rejected before it reached the store
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("latitude {0} is outside of the range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside of the range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("location name must not be empty")]
    EmptyName,
    #[error("location name is {0} characters long, the maximum is 100")]
    NameTooLong(usize),
    #[error("page must be at least 1")]
    Page,
    #[error("per_page must be between 1 and 100, got {0}")]
    PerPage(u32),
    #[error("radius must be greater than 0 and at most 50000 meters, got {0}")]
    Radius(f64),
    #[error("minimum distance must be a non-negative number of meters, got {0}")]
    MinDistance(f64),
    #[error("maximum distance must be greater than 0 and at most 50000 meters, got {0}")]
    MaxDistance(f64),
    #[error("results can only be sorted by distance when searching around a point")]
    SortByDistanceWithoutCenter,
    #[error("invalid GeoJSON point: {0}")]
    GeoJson(String),
    #[error("invalid WKT point: {0}")]
    Wkt(String),
}

/// A list of error types that can occur within this library
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("location {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    DatabaseMigrationError(#[from] sqlx::migrate::MigrateError),
}

/// A convenience type alias for a [Result] with [Error] as its error type
pub type Result<T, E = Error> = std::result::Result<T, E>;

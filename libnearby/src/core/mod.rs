//! Core infrastructure for storing and querying locations.
pub mod database;
pub mod error;
pub mod query;

//! This is a library for storing named places on the Earth's surface and
//! finding them again by name, by distance from a point, or within a ring of
//! distances around a point.

pub mod assemble;
pub mod core;
pub mod dedup;
pub mod geometry;
pub mod location;
pub mod plan;
pub mod service;
pub mod spatial;
pub mod store;

pub use crate::core::database::Database;
pub use crate::core::error::{Error, Result, ValidationError};

//! dbseed core - shared abstractions for the foreign-key aware importer
//!
//! This crate provides the traits and types every other dbseed crate
//! depends on. It defines:
//!
//! - `DatabaseDriver` - Trait for engine driver implementations
//! - `Connection` - Trait for a single live database connection
//! - `DatabaseClient` - The capability set the importer talks to
//! - `SchemaIntrospection` - Per-engine catalog queries
//! - The normalized schema model (`TableInfo`, `ColumnInfo`, ...)
//! - Value conversion, random placeholder values and parent-record resolution

mod client;
mod connection;
pub mod convert;
mod driver;
mod error;
pub mod memory;
pub mod random;
pub mod resolver;
mod schema;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;

pub use client::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use schema::*;
pub use types::*;

//! dbseed drivers - engine adapters and the driver registry
//!
//! This crate gathers the concrete driver crates behind cargo features and
//! exposes them through a [`DriverRegistry`] keyed by driver id.

#[cfg(feature = "db2")]
pub use dbseed_driver_db2 as db2;
#[cfg(feature = "mysql")]
pub use dbseed_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use dbseed_driver_postgres as postgres;

mod registry;

pub use registry::{DatabaseKind, DriverRegistry, UnknownDatabaseKind};

/// Re-export commonly used types from dbseed-core
pub use dbseed_core::{
    ConnectionConfig, DatabaseClient, DatabaseDriver, DbseedError, Result, SchemaModel,
};

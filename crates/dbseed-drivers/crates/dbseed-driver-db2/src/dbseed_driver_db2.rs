//! IBM DB2 support for dbseed
//!
//! [`Db2Client`] speaks DB2 SQL over any [`dbseed_core::Connection`]: the
//! SYSCAT catalog queries, `MERGE` based upserts and the parent-record
//! lookup. [`Db2Driver`] is registered so `--db-type db2` is recognized,
//! but this build ships no DB2 wire transport and its `connect` reports
//! the missing support.

mod client;
pub mod dialect;
mod driver;
mod schema;

pub use client::Db2Client;
pub use driver::Db2Driver;

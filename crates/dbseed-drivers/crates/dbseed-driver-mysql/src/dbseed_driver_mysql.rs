//! MySQL driver for dbseed

mod client;
mod connection;
pub mod dialect;
mod driver;
mod schema;

pub use connection::{MySqlConnection, parse_connection_string};
pub use driver::MySqlDriver;
pub use schema::MySqlCatalog;

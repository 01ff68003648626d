//! PostgreSQL driver implementation

mod client;
mod connection;
pub mod dialect;
mod driver;
mod schema;

pub use connection::PostgresConnection;
pub use driver::PostgresDriver;
pub use schema::{PostgresCatalog, normalize_column_default};

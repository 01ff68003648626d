//! Connection trait

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// A single live database connection
///
/// Drivers bind `params` positionally using their own placeholder syntax
/// (`$1` for PostgreSQL, `?` for MySQL and DB2).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql", "mysql", "db2")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/MERGE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Ask the server to parse and plan `sql` without running it.
    ///
    /// Drivers without a separate prepare step accept everything.
    async fn prepare(&self, sql: &str) -> Result<()> {
        let _ = sql;
        Ok(())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

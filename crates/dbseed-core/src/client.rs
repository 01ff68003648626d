//! The capability set the importer drives, implemented once per engine

use crate::{
    Connection, InsertStatement, Result, SchemaIntrospection, SchemaModel, TableInfo, Value,
    introspect_schema,
};
use async_trait::async_trait;

/// Engine adapter used by the importer and the parent-record resolver.
///
/// One connection backs every call, so implementations never need to
/// coordinate between requests.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Get the driver name (e.g., "postgresql", "mysql", "db2")
    fn driver_name(&self) -> &str;

    /// Underlying connection
    fn connection(&self) -> &dyn Connection;

    /// Catalog queries for this engine
    fn schema_introspection(&self) -> &dyn SchemaIntrospection;

    /// Introspect every base table of `schema` into the normalized model
    async fn get_schema_info(&self, schema: &str) -> Result<SchemaModel> {
        introspect_schema(self.schema_introspection(), schema).await
    }

    /// Build (and validate with the server) the per-row insert for a table.
    ///
    /// Tables with a primary key get the engine's upsert form.
    async fn prepare_insert_statement(&self, table: &TableInfo) -> Result<InsertStatement>;

    /// Run a prepared insert with one value per table column
    async fn execute_insert(&self, statement: &InsertStatement, values: &[Value]) -> Result<u64> {
        let result = self.connection().execute(&statement.sql, values).await?;
        Ok(result.affected_rows)
    }

    /// Whether `table` has a row whose `column` equals `value`
    async fn parent_record_exists(&self, table: &TableInfo, column: &str, value: &str)
    -> Result<bool>;

    /// Insert a synthesized row, silently keeping any row that already
    /// holds the same key. Returns whether a row was actually written.
    async fn insert_parent_record(&self, table: &TableInfo, values: &[Value]) -> Result<bool>;

    /// Make sure `parent` has a row with `column = value`, creating it and
    /// its own missing ancestors when absent.
    ///
    /// Returns how many rows were synthesized along the way.
    async fn ensure_parent_record_exists(
        &self,
        parent: &TableInfo,
        column: &str,
        value: &str,
        schema: &SchemaModel,
    ) -> Result<usize>;

    /// Close the connection
    async fn close(&self) -> Result<()> {
        self.connection().close().await
    }
}

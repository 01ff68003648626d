//! `DatabaseClient` implementation for MySQL

use async_trait::async_trait;
use dbseed_core::{
    Connection, DatabaseClient, DbseedError, InsertStatement, Result, SchemaIntrospection,
    SchemaModel, TableInfo, Value, resolver::ensure_parent_record,
};

use crate::MySqlConnection;
use crate::dialect::{build_exists_sql, build_insert_ignore_sql, build_upsert_sql};

#[async_trait]
impl DatabaseClient for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    fn connection(&self) -> &dyn Connection {
        self
    }

    fn schema_introspection(&self) -> &dyn SchemaIntrospection {
        self
    }

    #[tracing::instrument(skip(self, table), fields(table = %table.name))]
    async fn prepare_insert_statement(&self, table: &TableInfo) -> Result<InsertStatement> {
        let sql = build_upsert_sql(table);
        self.prepare(&sql).await.map_err(|e| {
            DbseedError::Query(format!(
                "failed to prepare insert statement for table {}: {}",
                table.name, e
            ))
        })?;

        Ok(InsertStatement {
            table_name: table.name.clone(),
            sql,
            param_count: table.columns.len(),
        })
    }

    async fn parent_record_exists(&self, table: &TableInfo, column: &str, value: &str) -> Result<bool> {
        let result = self
            .query(
                &build_exists_sql(table, column),
                &[Value::String(value.to_string())],
            )
            .await?;

        Ok(result
            .rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn insert_parent_record(&self, table: &TableInfo, values: &[Value]) -> Result<bool> {
        let result = self.execute(&build_insert_ignore_sql(table), values).await?;
        Ok(result.affected_rows > 0)
    }

    async fn ensure_parent_record_exists(
        &self,
        parent: &TableInfo,
        column: &str,
        value: &str,
        schema: &SchemaModel,
    ) -> Result<usize> {
        ensure_parent_record(self, parent, column, value, schema).await
    }

    async fn close(&self) -> Result<()> {
        Connection::close(self).await
    }
}

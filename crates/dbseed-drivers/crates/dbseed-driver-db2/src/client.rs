//! `DatabaseClient` for DB2

use async_trait::async_trait;
use dbseed_core::{
    Connection, DatabaseClient, DbseedError, InsertStatement, Result, SchemaIntrospection,
    SchemaModel, TableInfo, Value, resolver::ensure_parent_record,
};
use std::sync::Arc;

use crate::dialect::{build_exists_sql, build_insert_sql, build_upsert_sql};

/// DB2 adapter over an open connection
pub struct Db2Client {
    conn: Arc<dyn Connection>,
}

impl Db2Client {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }

    pub(crate) fn conn(&self) -> &dyn Connection {
        self.conn.as_ref()
    }
}

#[async_trait]
impl DatabaseClient for Db2Client {
    fn driver_name(&self) -> &str {
        "db2"
    }

    fn connection(&self) -> &dyn Connection {
        self.conn.as_ref()
    }

    fn schema_introspection(&self) -> &dyn SchemaIntrospection {
        self
    }

    #[tracing::instrument(skip(self, table), fields(table = %table.name))]
    async fn prepare_insert_statement(&self, table: &TableInfo) -> Result<InsertStatement> {
        let sql = build_upsert_sql(table);
        self.conn.prepare(&sql).await.map_err(|e| {
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
            .conn
            .query(
                &build_exists_sql(table, column),
                &[Value::String(value.to_string())],
            )
            .await?;
        Ok(result.has_rows())
    }

    /// DB2 has no insert-ignore form; a duplicate key means another writer
    /// created the row first, which is as good as inserting it.
    async fn insert_parent_record(&self, table: &TableInfo, values: &[Value]) -> Result<bool> {
        match self.conn.execute(&build_insert_sql(table), values).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(table = %table.name, "parent record already present, insert skipped");
                Ok(false)
            }
            Err(e) => Err(e),
        }
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbseed_core::testing::{ScriptedConnection, rows};
    use dbseed_core::{ColumnDataType, ColumnInfo};
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaModel {
        let regions = TableInfo::new("REGIONS")
            .with_column(ColumnInfo::new("ID", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("CODE", ColumnDataType::String))
            .with_primary_key(["ID"])
            .with_unique_key(["CODE"]);
        let stores = TableInfo::new("STORES")
            .with_column(ColumnInfo::new("ID", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("REGION_ID", ColumnDataType::Integer).with_default("1"))
            .with_primary_key(["ID"])
            .with_foreign_key("FK_REGION", "REGION_ID", "REGIONS", "ID");
        [regions, stores]
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect()
    }

    #[tokio::test]
    async fn test_prepare_validates_merge_with_server() {
        let conn = Arc::new(ScriptedConnection::new());
        let client = Db2Client::new(conn.clone());
        let schema = schema();

        let statement = client.prepare_insert_statement(&schema["STORES"]).await.unwrap();
        assert_eq!(statement.param_count, 2);
        assert!(statement.sql.starts_with("MERGE INTO \"STORES\""));
        assert_eq!(conn.prepared(), vec![statement.sql.clone()]);

        client
            .execute_insert(&statement, &[Value::Int64(1), Value::Int64(1)])
            .await
            .unwrap();
        assert_eq!(conn.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_parent_lookup_reads_row_presence() {
        let conn = Arc::new(ScriptedConnection::new().on_query("\"ID\" = ?", rows(vec![vec![Value::Int32(1)]])));
        let client = Db2Client::new(conn.clone());
        let schema = schema();

        assert!(client.parent_record_exists(&schema["REGIONS"], "ID", "7").await.unwrap());
        assert!(!client.parent_record_exists(&schema["REGIONS"], "CODE", "north").await.unwrap());
        assert_eq!(conn.queries()[0].1, vec![Value::String("7".into())]);
    }

    #[tokio::test]
    async fn test_duplicate_parent_insert_is_benign() {
        let conn = Arc::new(ScriptedConnection::new().failing_inserts(|| {
            DbseedError::UniqueViolation("SQL0803N duplicate key".into())
        }));
        let client = Db2Client::new(conn);
        let schema = schema();

        let inserted = client
            .insert_parent_record(&schema["REGIONS"], &[Value::Int64(1), Value::String("x".into())])
            .await
            .unwrap();
        assert!(!inserted);
    }

    #[tokio::test]
    async fn test_other_parent_insert_failures_surface() {
        let conn = Arc::new(
            ScriptedConnection::new()
                .failing_inserts(|| DbseedError::Query("SQL0204N undefined name".into())),
        );
        let client = Db2Client::new(conn);
        let schema = schema();

        let err = client
            .insert_parent_record(&schema["REGIONS"], &[Value::Int64(1), Value::Null])
            .await
            .unwrap_err();
        assert!(matches!(err, DbseedError::Query(_)));
    }

    #[tokio::test]
    async fn test_missing_store_creates_region_first() {
        let conn = Arc::new(ScriptedConnection::new());
        let client = Db2Client::new(conn.clone());
        let schema = schema();

        let created = client
            .ensure_parent_record_exists(&schema["STORES"], "ID", "10", &schema)
            .await
            .unwrap();
        assert_eq!(created, 2);

        let executed = conn.executed();
        assert_eq!(executed.len(), 2);
        assert!(executed[0].0.starts_with("INSERT INTO \"REGIONS\""));
        assert_eq!(executed[0].1[0], Value::Int64(1));
        assert!(matches!(executed[0].1[1], Value::String(_)));
        assert!(executed[1].0.starts_with("INSERT INTO \"STORES\""));
        assert_eq!(executed[1].1, vec![Value::Int64(10), Value::Int64(1)]);
    }
}

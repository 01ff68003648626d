//! MySQL schema introspection implementation
//!
//! In MySQL a schema is a database, so the `schema` argument is matched
//! against `table_schema`.

use async_trait::async_trait;
use dbseed_core::{
    ColumnDataType, ColumnInfo, Connection, ForeignKeyInfo, Result, SchemaIntrospection, Value,
};

use crate::MySqlConnection;

fn schema_and_table(schema: &str, table: &str) -> [Value; 2] {
    [
        Value::String(schema.to_string()),
        Value::String(table.to_string()),
    ]
}

/// Split a `GROUP_CONCAT` column list
fn split_column_group(group: &str) -> Vec<String> {
    group
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Catalog queries over any [`Connection`]
pub struct MySqlCatalog<'a> {
    conn: &'a dyn Connection,
}

impl<'a> MySqlCatalog<'a> {
    pub fn new(conn: &'a dyn Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SchemaIntrospection for MySqlCatalog<'_> {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let result = self
            .conn
            .query(
                "SELECT table_name
                 FROM information_schema.tables
                 WHERE table_schema = ? AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[Value::String(schema.to_string())],
            )
            .await?;

        Ok(result.rows.iter().map(|row| row.get_string(0)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let result = self
            .conn
            .query(
                "SELECT column_name, data_type, is_nullable, column_default
                 FROM information_schema.columns
                 WHERE table_schema = ? AND table_name = ?
                 ORDER BY ordinal_position",
                &schema_and_table(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get_string(0),
                data_type: ColumnDataType::from_native(&row.get_string(1)),
                nullable: row.get_string(2) == "YES",
                default_value: row.get_opt_string(3),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let result = self
            .conn
            .query(
                "SELECT kcu.column_name
                 FROM information_schema.table_constraints AS tc
                 JOIN information_schema.key_column_usage AS kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                  AND tc.table_name = kcu.table_name
                 WHERE tc.constraint_type = 'PRIMARY KEY'
                   AND tc.table_schema = ? AND tc.table_name = ?
                 ORDER BY kcu.ordinal_position",
                &schema_and_table(schema, table),
            )
            .await?;

        Ok(result.rows.iter().map(|row| row.get_string(0)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_unique_keys(&self, schema: &str, table: &str) -> Result<Vec<Vec<String>>> {
        let result = self
            .conn
            .query(
                "SELECT GROUP_CONCAT(kcu.column_name ORDER BY kcu.ordinal_position)
                 FROM information_schema.table_constraints AS tc
                 JOIN information_schema.key_column_usage AS kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                  AND tc.table_name = kcu.table_name
                 WHERE tc.constraint_type = 'UNIQUE'
                   AND tc.table_schema = ? AND tc.table_name = ?
                 GROUP BY tc.constraint_name
                 ORDER BY tc.constraint_name",
                &schema_and_table(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| split_column_group(&row.get_string(0)))
            .filter(|group| !group.is_empty())
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let result = self
            .conn
            .query(
                "SELECT kcu.constraint_name, kcu.column_name,
                        kcu.referenced_table_name, kcu.referenced_column_name
                 FROM information_schema.key_column_usage AS kcu
                 WHERE kcu.constraint_schema = ?
                   AND kcu.table_name = ?
                   AND kcu.referenced_table_name IS NOT NULL
                 ORDER BY kcu.constraint_name, kcu.ordinal_position",
                &schema_and_table(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ForeignKeyInfo {
                constraint_name: row.get_string(0),
                table_name: table.to_string(),
                column_name: row.get_string(1),
                foreign_table_name: row.get_string(2),
                foreign_column_name: row.get_string(3),
            })
            .collect())
    }
}

#[async_trait]
impl SchemaIntrospection for MySqlConnection {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        MySqlCatalog::new(self).list_tables(schema).await
    }

    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        MySqlCatalog::new(self).get_columns(schema, table).await
    }

    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        MySqlCatalog::new(self).get_primary_key(schema, table).await
    }

    async fn get_unique_keys(&self, schema: &str, table: &str) -> Result<Vec<Vec<String>>> {
        MySqlCatalog::new(self).get_unique_keys(schema, table).await
    }

    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        MySqlCatalog::new(self).get_foreign_keys(schema, table).await
    }
}

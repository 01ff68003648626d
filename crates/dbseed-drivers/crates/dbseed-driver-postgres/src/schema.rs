//! PostgreSQL schema introspection implementation

use async_trait::async_trait;
use dbseed_core::{
    ColumnDataType, ColumnInfo, Connection, ForeignKeyInfo, Result, SchemaIntrospection, Value,
};

use crate::PostgresConnection;
use crate::dialect::escape_identifier_pg;

fn regclass_name(schema: &str, table: &str) -> String {
    format!("{}.{}", escape_identifier_pg(schema), escape_identifier_pg(table))
}

/// Reduce a catalog default expression to the literal text it stands for.
///
/// `'abc'::character varying` becomes `abc` and `(-1)::integer` becomes
/// `-1`; a `NULL` default counts as no default. Anything that is not a
/// plain literal (`nextval(...)`, `now()`) is returned unchanged.
pub fn normalize_column_default(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.to_uppercase().starts_with("NULL") {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix('\'') {
        if let Some(end) = rest.rfind('\'') {
            let suffix = &rest[end + 1..];
            if suffix.is_empty() || suffix.starts_with("::") {
                return Some(rest[..end].replace("''", "'"));
            }
        }
        return Some(trimmed.to_string());
    }

    let head = trimmed.split("::").next().unwrap_or(trimmed);
    let literal = head.trim_start_matches('(').trim_end_matches(')');
    if literal.parse::<f64>().is_ok() || matches!(literal, "true" | "false") {
        return Some(literal.to_string());
    }
    Some(trimmed.to_string())
}

/// Catalog queries over any [`Connection`]
pub struct PostgresCatalog<'a> {
    conn: &'a dyn Connection,
}

impl<'a> PostgresCatalog<'a> {
    pub fn new(conn: &'a dyn Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SchemaIntrospection for PostgresCatalog<'_> {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let result = self
            .conn
            .query(
                "SELECT table_name
                 FROM information_schema.tables
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'
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
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[
                    Value::String(schema.to_string()),
                    Value::String(table.to_string()),
                ],
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get_string(0),
                data_type: ColumnDataType::from_native(&row.get_string(1)),
                nullable: row.get_string(2) == "YES",
                default_value: row
                    .get_opt_string(3)
                    .and_then(|d| normalize_column_default(&d)),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let result = self
            .conn
            .query(
                "SELECT a.attname
                 FROM pg_index i
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                 WHERE i.indrelid = $1::text::regclass AND i.indisprimary
                 ORDER BY array_position(i.indkey::int2[], a.attnum)",
                &[Value::String(regclass_name(schema, table))],
            )
            .await?;

        Ok(result.rows.iter().map(|row| row.get_string(0)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_unique_keys(&self, schema: &str, table: &str) -> Result<Vec<Vec<String>>> {
        let result = self
            .conn
            .query(
                "SELECT array_agg(a.attname ORDER BY array_position(i.indkey::int2[], a.attnum))
                 FROM pg_index i
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                 WHERE i.indrelid = $1::text::regclass AND i.indisunique AND NOT i.indisprimary
                 GROUP BY i.indexrelid
                 ORDER BY i.indexrelid",
                &[Value::String(regclass_name(schema, table))],
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get(0).and_then(Value::as_string_array))
            .filter(|group| !group.is_empty())
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let result = self
            .conn
            .query(
                "SELECT tc.constraint_name, kcu.column_name,
                        ccu.table_name AS foreign_table_name,
                        ccu.column_name AS foreign_column_name
                 FROM information_schema.table_constraints AS tc
                 JOIN information_schema.key_column_usage AS kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                 JOIN information_schema.constraint_column_usage AS ccu
                   ON ccu.constraint_name = tc.constraint_name
                  AND ccu.constraint_schema = tc.table_schema
                 WHERE tc.constraint_type = 'FOREIGN KEY'
                   AND tc.table_schema = $1
                   AND tc.table_name = $2
                 ORDER BY tc.constraint_name, kcu.ordinal_position",
                &[
                    Value::String(schema.to_string()),
                    Value::String(table.to_string()),
                ],
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
impl SchemaIntrospection for PostgresConnection {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        PostgresCatalog::new(self).list_tables(schema).await
    }

    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        PostgresCatalog::new(self).get_columns(schema, table).await
    }

    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        PostgresCatalog::new(self).get_primary_key(schema, table).await
    }

    async fn get_unique_keys(&self, schema: &str, table: &str) -> Result<Vec<Vec<String>>> {
        PostgresCatalog::new(self).get_unique_keys(schema, table).await
    }

    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        PostgresCatalog::new(self).get_foreign_keys(schema, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbseed_core::introspect_schema;
    use dbseed_core::testing::{ScriptedConnection, rows};
    use pretty_assertions::assert_eq;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    fn names(list: &[&str]) -> Value {
        Value::Array(list.iter().map(|n| s(n)).collect())
    }

    fn catalog() -> ScriptedConnection {
        ScriptedConnection::new()
            .on_query("FROM information_schema.tables", rows(vec![vec![s("orders")]]))
            .on_query(
                "FROM information_schema.columns",
                rows(vec![
                    vec![s("id"), s("integer"), s("NO"), s("nextval('orders_id_seq'::regclass)")],
                    vec![s("status"), s("character varying"), s("NO"), s("'new'::character varying")],
                    vec![s("customer_id"), s("bigint"), s("YES"), Value::Null],
                    vec![s("placed_at"), s("timestamp with time zone"), s("YES"), s("NULL::timestamp with time zone")],
                ]),
            )
            .on_query(
                "array_agg",
                rows(vec![
                    vec![names(&["status", "customer_id"])],
                    vec![names(&["placed_at"])],
                    vec![Value::Null],
                ]),
            )
            .on_query("i.indisprimary", rows(vec![vec![s("id")]]))
            .on_query(
                "'FOREIGN KEY'",
                rows(vec![vec![s("fk_customer"), s("customer_id"), s("customers"), s("id")]]),
            )
    }

    #[tokio::test]
    async fn test_schema_model_from_catalog_rows() {
        let conn = catalog();

        let model = introspect_schema(&PostgresCatalog::new(&conn), "public").await.unwrap();
        let orders = &model["orders"];

        assert_eq!(orders.schema.as_deref(), Some("public"));
        assert_eq!(orders.column_names(), vec!["id", "status", "customer_id", "placed_at"]);
        assert_eq!(
            orders.columns.iter().map(|c| c.data_type).collect::<Vec<_>>(),
            vec![
                ColumnDataType::Integer,
                ColumnDataType::String,
                ColumnDataType::Integer,
                ColumnDataType::Timestamp,
            ]
        );
        assert_eq!(
            orders.columns.iter().map(|c| c.nullable).collect::<Vec<_>>(),
            vec![false, false, true, true]
        );
        assert_eq!(
            orders.columns[0].default_value.as_deref(),
            Some("nextval('orders_id_seq'::regclass)")
        );
        assert_eq!(orders.columns[1].default_value.as_deref(), Some("new"));
        assert_eq!(orders.columns[2].default_value, None);
        assert_eq!(orders.columns[3].default_value, None);
        assert_eq!(orders.primary_key_columns, vec!["id".to_string()]);
        assert_eq!(
            orders.unique_key_columns,
            vec![
                vec!["status".to_string(), "customer_id".to_string()],
                vec!["placed_at".to_string()],
            ]
        );
        assert_eq!(
            orders.foreign_keys,
            vec![ForeignKeyInfo {
                constraint_name: "fk_customer".to_string(),
                table_name: "orders".to_string(),
                column_name: "customer_id".to_string(),
                foreign_table_name: "customers".to_string(),
                foreign_column_name: "id".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_key_lookups_bind_quoted_regclass() {
        let conn = catalog();
        let introspection = PostgresCatalog::new(&conn);

        introspection.get_primary_key("sales", "Orders").await.unwrap();
        introspection.get_columns("sales", "Orders").await.unwrap();

        let queries = conn.queries();
        assert_eq!(queries[0].1, vec![s("\"sales\".\"Orders\"")]);
        assert_eq!(queries[1].1, vec![s("sales"), s("Orders")]);
    }

    #[test]
    fn test_literal_defaults_are_unwrapped() {
        assert_eq!(
            normalize_column_default("'pending'::character varying").as_deref(),
            Some("pending")
        );
        assert_eq!(normalize_column_default("'it''s'::text").as_deref(), Some("it's"));
        assert_eq!(normalize_column_default("(-1)::integer").as_deref(), Some("-1"));
        assert_eq!(normalize_column_default("0").as_deref(), Some("0"));
        assert_eq!(normalize_column_default("true").as_deref(), Some("true"));
    }

    #[test]
    fn test_expression_defaults_are_kept() {
        assert_eq!(
            normalize_column_default("nextval('users_id_seq'::regclass)").as_deref(),
            Some("nextval('users_id_seq'::regclass)")
        );
        assert_eq!(normalize_column_default("now()").as_deref(), Some("now()"));
    }

    #[test]
    fn test_null_default_is_no_default() {
        assert_eq!(normalize_column_default("NULL::character varying"), None);
        assert_eq!(normalize_column_default("  "), None);
    }

    #[test]
    fn test_regclass_name_is_quoted() {
        assert_eq!(regclass_name("public", "Users"), "\"public\".\"Users\"");
    }
}

//! Normalized schema model and the introspection trait drivers implement

use crate::{DbseedError, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Catalog queries every engine answers.
///
/// `schema` is the engine's namespace: a PostgreSQL schema, a MySQL
/// database or a DB2 schema. Implementations return tables and columns
/// in catalog order.
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// List the base tables in a schema
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Get columns for a table in ordinal order
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Get primary key columns for a table in key order
    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Get unique key column groups for a table, the primary key excluded
    async fn get_unique_keys(&self, schema: &str, table: &str) -> Result<Vec<Vec<String>>>;

    /// Get foreign keys declared by a table, one entry per column
    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>>;
}

/// Build the full schema model by querying every table in turn.
///
/// Columns, primary key, unique keys and foreign keys are fetched in that
/// order. The first failing query aborts the whole build.
#[tracing::instrument(skip(introspection))]
pub async fn introspect_schema(
    introspection: &dyn SchemaIntrospection,
    schema: &str,
) -> Result<SchemaModel> {
    let tables = introspection.list_tables(schema).await.map_err(|e| {
        DbseedError::Schema(format!("failed to get table names for schema {}: {}", schema, e))
    })?;

    let mut model = SchemaModel::new();
    for table in tables {
        let columns = introspection
            .get_columns(schema, &table)
            .await
            .map_err(|e| schema_error("column info", &table, e))?;
        let primary_key_columns = introspection
            .get_primary_key(schema, &table)
            .await
            .map_err(|e| schema_error("primary key info", &table, e))?;
        let unique_key_columns = introspection
            .get_unique_keys(schema, &table)
            .await
            .map_err(|e| schema_error("unique key info", &table, e))?;
        let foreign_keys = introspection
            .get_foreign_keys(schema, &table)
            .await
            .map_err(|e| schema_error("foreign key info", &table, e))?;

        tracing::debug!(
            table = %table,
            columns = columns.len(),
            foreign_keys = foreign_keys.len(),
            "introspected table"
        );

        model.insert(
            table.clone(),
            TableInfo {
                schema: Some(schema.to_string()),
                name: table,
                columns,
                primary_key_columns,
                unique_key_columns,
                foreign_keys,
            },
        );
    }

    tracing::info!(schema = %schema, tables = model.len(), "schema information retrieved");
    Ok(model)
}

fn schema_error(what: &str, table: &str, err: DbseedError) -> DbseedError {
    DbseedError::Schema(format!("failed to get {} for table {}: {}", what, table, err))
}

/// Canonical column type every engine-native type is folded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnDataType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Unknown,
}

impl ColumnDataType {
    /// Map an engine-native type name to its canonical type.
    ///
    /// Matching is case-insensitive. Unrecognized names become `Unknown`
    /// with a warning.
    pub fn from_native(native: &str) -> Self {
        match native.trim().to_lowercase().as_str() {
            "text" | "character varying" | "varchar" | "char" | "character" | "clob"
            | "graphic" | "vargraphic" | "long vargraphic" | "tinytext" | "mediumtext"
            | "longtext" | "enum" => ColumnDataType::String,
            "integer" | "smallint" | "bigint" | "int" | "tinyint" | "mediumint" => {
                ColumnDataType::Integer
            }
            "numeric" | "decimal" | "real" | "double precision" | "double" | "decfloat"
            | "float" => ColumnDataType::Float,
            "boolean" | "bool" => ColumnDataType::Boolean,
            "date" => ColumnDataType::Date,
            "timestamp without time zone" | "timestamp with time zone" | "timestamp" | "time"
            | "datetime" => ColumnDataType::Timestamp,
            other => {
                tracing::warn!(data_type = %other, "unknown data type, mapping to UNKNOWN");
                ColumnDataType::Unknown
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnDataType::String => "STRING",
            ColumnDataType::Integer => "INTEGER",
            ColumnDataType::Float => "FLOAT",
            ColumnDataType::Boolean => "BOOLEAN",
            ColumnDataType::Date => "DATE",
            ColumnDataType::Timestamp => "TIMESTAMP",
            ColumnDataType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: ColumnDataType,
    pub nullable: bool,
    /// Declared default, as raw text from the catalog
    pub default_value: Option<String>,
}

impl ColumnInfo {
    /// A non-nullable column without a default
    pub fn new(name: impl Into<String>, data_type: ColumnDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            default_value: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

/// One column of a foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    /// Table declaring the constraint (the child)
    pub table_name: String,
    pub column_name: String,
    /// Referenced table (the parent)
    pub foreign_table_name: String,
    pub foreign_column_name: String,
}

impl ForeignKeyInfo {
    pub fn new(
        constraint_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        foreign_table_name: impl Into<String>,
        foreign_column_name: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            foreign_table_name: foreign_table_name.into(),
            foreign_column_name: foreign_column_name.into(),
        }
    }
}

/// Table information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Owning schema, used to qualify generated SQL
    pub schema: Option<String>,
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    pub primary_key_columns: Vec<String>,
    /// Unique key column groups, the primary key excluded
    pub unique_key_columns: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns: Vec::new(),
            primary_key_columns: Vec::new(),
            unique_key_columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unique_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.unique_key_columns
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add a single-column foreign key from `column` to `parent.parent_column`
    pub fn with_foreign_key(
        mut self,
        constraint: &str,
        column: &str,
        parent: &str,
        parent_column: &str,
    ) -> Self {
        let fk = ForeignKeyInfo::new(constraint, self.name.clone(), column, parent, parent_column);
        self.foreign_keys.push(fk);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.primary_key_columns.iter().any(|c| c == name)
    }

    /// Columns whose value alone must be unique: every primary key column
    /// plus the columns of single-column unique keys
    pub fn unique_columns(&self) -> HashSet<&str> {
        let mut columns: HashSet<&str> =
            self.primary_key_columns.iter().map(String::as_str).collect();
        for group in &self.unique_key_columns {
            if let [only] = group.as_slice() {
                columns.insert(only.as_str());
            }
        }
        columns
    }

    /// The first foreign key owned by `column`
    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeyInfo> {
        self.foreign_keys.iter().find(|fk| fk.column_name == column)
    }

    /// Non-key columns, in ordinal order
    pub fn non_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !self.is_primary_key_column(&c.name))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Table name to table metadata, in catalog order
pub type SchemaModel = IndexMap<String, TableInfo>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_native_type_synonyms() {
        let cases = [
            ("VARCHAR", ColumnDataType::String),
            ("character varying", ColumnDataType::String),
            ("long vargraphic", ColumnDataType::String),
            ("BIGINT", ColumnDataType::Integer),
            ("DECIMAL", ColumnDataType::Float),
            ("double precision", ColumnDataType::Float),
            ("DECFLOAT", ColumnDataType::Float),
            ("bool", ColumnDataType::Boolean),
            ("date", ColumnDataType::Date),
            ("timestamp with time zone", ColumnDataType::Timestamp),
            ("TIMESTAMP", ColumnDataType::Timestamp),
            ("time", ColumnDataType::Timestamp),
            ("datetime", ColumnDataType::Timestamp),
            ("jsonb", ColumnDataType::Unknown),
            ("uuid", ColumnDataType::Unknown),
        ];
        for (native, expected) in cases {
            assert_eq!(ColumnDataType::from_native(native), expected, "{}", native);
        }
    }

    #[test]
    fn test_data_type_display() {
        assert_eq!(ColumnDataType::Timestamp.to_string(), "TIMESTAMP");
        assert_eq!(ColumnDataType::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_unique_columns_include_pk_and_single_column_keys() {
        let table = TableInfo::new("product_tags")
            .with_column(ColumnInfo::new("product_id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("tag_id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("code", ColumnDataType::String))
            .with_column(ColumnInfo::new("a", ColumnDataType::String))
            .with_column(ColumnInfo::new("b", ColumnDataType::String))
            .with_primary_key(["product_id", "tag_id"])
            .with_unique_key(["code"])
            .with_unique_key(["a", "b"]);

        let mut unique: Vec<&str> = table.unique_columns().into_iter().collect();
        unique.sort();
        assert_eq!(unique, vec!["code", "product_id", "tag_id"]);
        assert_eq!(table.non_key_columns(), vec!["code", "a", "b"]);
    }

    struct FixedCatalog;

    #[async_trait]
    impl SchemaIntrospection for FixedCatalog {
        async fn list_tables(&self, _schema: &str) -> Result<Vec<String>> {
            Ok(vec!["users".into(), "broken".into()])
        }

        async fn get_columns(&self, _schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
            if table == "broken" {
                return Err(DbseedError::Query("relation does not exist".into()));
            }
            Ok(vec![ColumnInfo::new("id", ColumnDataType::Integer)])
        }

        async fn get_primary_key(&self, _schema: &str, _table: &str) -> Result<Vec<String>> {
            Ok(vec!["id".into()])
        }

        async fn get_unique_keys(&self, _schema: &str, _table: &str) -> Result<Vec<Vec<String>>> {
            Ok(Vec::new())
        }

        async fn get_foreign_keys(&self, _schema: &str, _table: &str) -> Result<Vec<ForeignKeyInfo>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_introspection_failure_names_the_table() {
        let err = introspect_schema(&FixedCatalog, "public").await.unwrap_err();
        assert!(
            err.to_string()
                .contains("failed to get column info for table broken"),
            "{}",
            err
        );
    }
}

//! In-process backend holding rows in memory
//!
//! `MemoryClient` enforces the constraints the importer depends on:
//! primary keys, NOT NULL, unique keys and foreign keys. Dry runs import
//! into it instead of the real database, and tests use it as a stand-in
//! engine.

use crate::convert::{convert_to_db_type, value_to_key_string};
use crate::resolver::ensure_parent_record;
use crate::{
    ColumnInfo, Connection, DatabaseClient, DbseedError, ForeignKeyInfo, InsertStatement,
    QueryResult, Result, SchemaIntrospection, SchemaModel, StatementResult, TableInfo, Value,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnConflict {
    /// Replace the non-key columns of the existing row
    Update,
    /// Keep the existing row
    Ignore,
}

pub struct MemoryClient {
    schema: SchemaModel,
    tables: Mutex<HashMap<String, Vec<Vec<Value>>>>,
    closed: AtomicBool,
}

impl MemoryClient {
    /// Empty store for every table in `schema`
    pub fn new(schema: SchemaModel) -> Self {
        let tables = schema.keys().map(|name| (name.clone(), Vec::new())).collect();
        Self {
            schema,
            tables: Mutex::new(tables),
            closed: AtomicBool::new(false),
        }
    }

    /// Seed rows without constraint checks
    pub fn with_rows(self, table: &str, rows: Vec<Vec<Value>>) -> Self {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, Vec::len)
    }

    /// Row counts per table, in schema order
    pub fn row_counts(&self) -> IndexMap<String, usize> {
        let tables = self.tables.lock();
        self.schema
            .keys()
            .map(|name| (name.clone(), tables.get(name).map_or(0, Vec::len)))
            .collect()
    }

    fn table(&self, name: &str) -> Result<&TableInfo> {
        self.schema
            .get(name)
            .ok_or_else(|| DbseedError::NotFound(format!("table {} does not exist", name)))
    }

    fn store(&self, table: &TableInfo, values: &[Value], on_conflict: OnConflict) -> Result<u64> {
        if values.len() != table.columns.len() {
            return Err(DbseedError::Query(format!(
                "table {} has {} columns but {} values were supplied",
                table.name,
                table.columns.len(),
                values.len()
            )));
        }

        for (column, value) in table.columns.iter().zip(values) {
            if value.is_null() && !column.nullable {
                return Err(DbseedError::Query(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column.name, table.name
                )));
            }
        }

        let mut tables = self.tables.lock();

        for fk in &table.foreign_keys {
            self.check_foreign_key(&tables, table, fk, values)?;
        }

        let rows = tables.entry(table.name.clone()).or_default();

        if !table.primary_key_columns.is_empty() {
            let pk = key_indexes(table, &table.primary_key_columns);
            if let Some(existing) = rows.iter_mut().find(|row| same_key(row, values, &pk)) {
                return match on_conflict {
                    OnConflict::Update => {
                        existing.clone_from_slice(values);
                        Ok(1)
                    }
                    OnConflict::Ignore => Ok(0),
                };
            }
        }

        for group in &table.unique_key_columns {
            let indexes = key_indexes(table, group);
            if indexes.iter().any(|&i| values[i].is_null()) {
                continue;
            }
            if rows.iter().any(|row| same_key(row, values, &indexes)) {
                return match on_conflict {
                    OnConflict::Ignore => Ok(0),
                    OnConflict::Update => Err(DbseedError::UniqueViolation(format!(
                        "duplicate value violates unique constraint on {}({})",
                        table.name,
                        group.join(", ")
                    ))),
                };
            }
        }

        rows.push(values.to_vec());
        Ok(1)
    }

    fn check_foreign_key(
        &self,
        tables: &HashMap<String, Vec<Vec<Value>>>,
        table: &TableInfo,
        fk: &ForeignKeyInfo,
        values: &[Value],
    ) -> Result<()> {
        let Some(index) = table.column_index(&fk.column_name) else {
            return Ok(());
        };
        if values[index].is_null() {
            return Ok(());
        }
        let parent = self.table(&fk.foreign_table_name)?;
        let Some(parent_index) = parent.column_index(&fk.foreign_column_name) else {
            return Err(DbseedError::Schema(format!(
                "column {} not found in table {}",
                fk.foreign_column_name, parent.name
            )));
        };

        let key = value_to_key_string(&values[index]);
        // a row may reference itself
        if parent.name == table.name && value_to_key_string(&values[parent_index]) == key {
            return Ok(());
        }
        let found = tables.get(&parent.name).is_some_and(|rows| {
            rows.iter()
                .any(|row| value_to_key_string(&row[parent_index]) == key)
        });
        if found {
            Ok(())
        } else {
            Err(DbseedError::Query(format!(
                "insert on table \"{}\" violates foreign key constraint \"{}\": key ({})=({}) is not present in table \"{}\"",
                table.name, fk.constraint_name, fk.column_name, key, parent.name
            )))
        }
    }
}

fn key_indexes(table: &TableInfo, columns: &[String]) -> Vec<usize> {
    columns.iter().filter_map(|c| table.column_index(c)).collect()
}

fn same_key(row: &[Value], values: &[Value], indexes: &[usize]) -> bool {
    indexes
        .iter()
        .all(|&i| value_to_key_string(&row[i]) == value_to_key_string(&values[i]))
}

fn matches_lookup(stored: &Value, column: &ColumnInfo, wanted: &str) -> bool {
    if value_to_key_string(stored) == wanted {
        return true;
    }
    convert_to_db_type(wanted, column).is_ok_and(|typed| !typed.is_null() && &typed == stored)
}

#[async_trait]
impl Connection for MemoryClient {
    fn driver_name(&self) -> &str {
        "memory"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Err(DbseedError::NotSupported(
            "the in-memory backend does not execute SQL".into(),
        ))
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Err(DbseedError::NotSupported(
            "the in-memory backend does not execute SQL".into(),
        ))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaIntrospection for MemoryClient {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .schema
            .values()
            .filter(|t| t.schema.as_deref().is_none_or(|s| s == schema))
            .map(|t| t.name.clone())
            .collect())
    }

    async fn get_columns(&self, _schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn get_primary_key(&self, _schema: &str, table: &str) -> Result<Vec<String>> {
        Ok(self.table(table)?.primary_key_columns.clone())
    }

    async fn get_unique_keys(&self, _schema: &str, table: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.table(table)?.unique_key_columns.clone())
    }

    async fn get_foreign_keys(&self, _schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }
}

#[async_trait]
impl DatabaseClient for MemoryClient {
    fn driver_name(&self) -> &str {
        "memory"
    }

    fn connection(&self) -> &dyn Connection {
        self
    }

    fn schema_introspection(&self) -> &dyn SchemaIntrospection {
        self
    }

    async fn prepare_insert_statement(&self, table: &TableInfo) -> Result<InsertStatement> {
        let table = self.table(&table.name)?;
        let placeholders = vec!["?"; table.columns.len()].join(", ");
        Ok(InsertStatement {
            table_name: table.name.clone(),
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name,
                table.column_names().join(", "),
                placeholders
            ),
            param_count: table.columns.len(),
        })
    }

    async fn execute_insert(&self, statement: &InsertStatement, values: &[Value]) -> Result<u64> {
        let table = self.table(&statement.table_name)?;
        self.store(table, values, OnConflict::Update)
    }

    async fn parent_record_exists(&self, table: &TableInfo, column: &str, value: &str) -> Result<bool> {
        let table = self.table(&table.name)?;
        let (index, info) = table
            .columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == column)
            .ok_or_else(|| {
                DbseedError::Query(format!("column {} does not exist in table {}", column, table.name))
            })?;

        let tables = self.tables.lock();
        Ok(tables
            .get(&table.name)
            .is_some_and(|rows| rows.iter().any(|row| matches_lookup(&row[index], info, value))))
    }

    async fn insert_parent_record(&self, table: &TableInfo, values: &[Value]) -> Result<bool> {
        let table = self.table(&table.name)?;
        self.store(table, values, OnConflict::Ignore).map(|written| written > 0)
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

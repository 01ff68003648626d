//! CSV import into an introspected schema
//!
//! Tables are processed in dependency order, one file and one row at a
//! time over a single client. A row whose foreign key points at a missing
//! parent gets that parent synthesized first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::StringRecord;
use dbseed_core::convert::convert_to_db_type;
use dbseed_core::{DatabaseClient, DbseedError, SchemaModel, TableInfo, Value};
use dbseed_schema::{DependencyGraph, GraphError};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Error messages kept per table; the count keeps going past this
const MAX_RECORDED_ERRORS: usize = 100;

/// Errors that abort an import
#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("failed to read CSV directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("failed to read CSV header from {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV file {} has no header row", .0.display())]
    EmptyFile(PathBuf),

    #[error("failed to read CSV file {} at line {line}: {source}", path.display())]
    Read {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("failed to determine import order: {0}")]
    Ordering(#[from] GraphError),

    #[error("table {0} not found in schema info")]
    TableNotFound(String),

    #[error("failed to prepare insert statement for table {table}: {source}")]
    Prepare {
        table: String,
        #[source]
        source: DbseedError,
    },

    #[error("failed to import {}: {source}", path.display())]
    Fatal {
        path: PathBuf,
        #[source]
        source: DbseedError,
    },
}

/// Progress callback for import operations
pub type CsvImportProgressCallback = Box<dyn Fn(CsvImportProgress) + Send + Sync>;

/// Import progress information
#[derive(Debug, Clone)]
pub struct CsvImportProgress {
    pub table: String,
    /// Position of the table in the import order (1-based)
    pub table_index: usize,
    pub total_tables: usize,
    pub rows_processed: u64,
    pub rows_added: u64,
    pub parents_created: u64,
    pub error_count: u64,
    pub message: String,
}

/// Outcome of importing one CSV file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvImportResult {
    /// Data rows read from the file
    pub rows_processed: u64,
    /// Rows the insert statement accepted
    pub rows_added: u64,
    /// Parent rows synthesized for unresolved foreign keys
    pub parents_created: u64,
    /// Row-local failures: conversions, parent resolution and inserts
    pub error_count: u64,
    /// Error messages (limited to first 100)
    pub errors: Vec<String>,
}

impl CsvImportResult {
    fn add_error(&mut self, error: String) {
        self.error_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(error);
        }
    }
}

/// Outcome of a directory import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// Dependency order every table was considered in
    pub order: Vec<String>,
    /// Per-table results, in import order
    pub tables: IndexMap<String, CsvImportResult>,
    /// Tables without a CSV file
    pub skipped: Vec<String>,
}

impl ImportSummary {
    pub fn total_rows_processed(&self) -> u64 {
        self.tables.values().map(|r| r.rows_processed).sum()
    }

    pub fn total_rows_added(&self) -> u64 {
        self.tables.values().map(|r| r.rows_added).sum()
    }

    pub fn total_parents_created(&self) -> u64 {
        self.tables.values().map(|r| r.parents_created).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.tables.values().map(|r| r.error_count).sum()
    }
}

/// Map each `*.csv` directly inside `dir` to the table named by its stem
pub fn discover_csv_files(dir: &Path) -> Result<IndexMap<String, PathBuf>, CsvImportError> {
    let directory_error = |source| CsvImportError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(directory_error)? {
        let path = entry.map_err(directory_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            Some((stem, path))
        })
        .collect())
}

/// Column of the CSV record feeding each table column, `None` when the
/// CSV does not provide it
fn map_columns(table: &TableInfo, header: Option<&StringRecord>) -> Vec<Option<usize>> {
    let Some(header) = header else {
        return (0..table.columns.len()).map(Some).collect();
    };

    let names: Vec<String> = header
        .iter()
        .map(|name| name.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    table
        .columns
        .iter()
        .map(|column| {
            let wanted = column.name.to_lowercase();
            let position = names.iter().position(|name| *name == wanted);
            if position.is_none() {
                tracing::warn!(
                    table = %table.name,
                    column = %column.name,
                    "column not found in CSV header, will use default/null"
                );
            }
            position
        })
        .collect()
}

/// Comma-delimited, ragged rows allowed; the header row is handled by hand
fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).flexible(true);
    builder
}

/// CSV importer bound to one client and the schema it reported
pub struct CsvImporter {
    client: Arc<dyn DatabaseClient>,
    schema: SchemaModel,
    progress_callback: Option<CsvImportProgressCallback>,
}

impl CsvImporter {
    /// Create a new CSV importer
    pub fn new(client: Arc<dyn DatabaseClient>, schema: SchemaModel) -> Self {
        Self {
            client,
            schema,
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress_callback(mut self, callback: CsvImportProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    fn report_progress(
        &self,
        table: &str,
        position: (usize, usize),
        result: &CsvImportResult,
        message: String,
    ) {
        if let Some(ref callback) = self.progress_callback {
            callback(CsvImportProgress {
                table: table.to_string(),
                table_index: position.0,
                total_tables: position.1,
                rows_processed: result.rows_processed,
                rows_added: result.rows_added,
                parents_created: result.parents_created,
                error_count: result.error_count,
                message,
            });
        }
    }

    /// Import every `*.csv` in `dir` into the table named by its stem,
    /// parents before children.
    #[tracing::instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn import_csv_files(
        &self,
        dir: &Path,
        has_header: bool,
    ) -> Result<ImportSummary, CsvImportError> {
        let files = discover_csv_files(dir)?;
        let order = DependencyGraph::from_schema(&self.schema).topological_sort()?;
        tracing::info!(order = ?order, "determined import order");

        for (name, path) in &files {
            if !self.schema.contains_key(name) {
                tracing::warn!(file = %path.display(), "CSV file matches no table in the schema, ignoring");
            }
        }

        let mut summary = ImportSummary {
            order: order.clone(),
            ..ImportSummary::default()
        };

        let total = order.len();
        for (index, table_name) in order.iter().enumerate() {
            let Some(path) = files.get(table_name) else {
                tracing::warn!(table = %table_name, "skipping table: no corresponding CSV file found");
                summary.skipped.push(table_name.clone());
                continue;
            };
            let Some(table) = self.schema.get(table_name) else {
                continue;
            };

            tracing::info!(table = %table_name, file = %path.display(), "importing CSV file");
            let result = self
                .import_table(path, table, has_header, (index + 1, total))
                .await?;
            tracing::info!(
                table = %table_name,
                rows_added = result.rows_added,
                parents_created = result.parents_created,
                errors = result.error_count,
                "finished importing CSV file"
            );
            summary.tables.insert(table_name.clone(), result);
        }

        Ok(summary)
    }

    /// Import one file into the named table. No ordering happens here;
    /// missing parents are still synthesized on demand.
    pub async fn import_single_csv(
        &self,
        path: &Path,
        table: &str,
        has_header: bool,
    ) -> Result<CsvImportResult, CsvImportError> {
        let table = self
            .schema
            .get(table)
            .ok_or_else(|| CsvImportError::TableNotFound(table.to_string()))?;
        self.import_table(path, table, has_header, (1, 1)).await
    }

    async fn import_table(
        &self,
        path: &Path,
        table: &TableInfo,
        has_header: bool,
        position: (usize, usize),
    ) -> Result<CsvImportResult, CsvImportError> {
        let reader = reader_builder()
            .from_path(path)
            .map_err(|e| CsvImportError::SourceNotFound(format!("{}: {}", path.display(), e)))?;
        self.import_records(reader, path, table, has_header, position)
            .await
    }

    async fn import_records<R: io::Read>(
        &self,
        mut reader: csv::Reader<R>,
        path: &Path,
        table: &TableInfo,
        has_header: bool,
        position: (usize, usize),
    ) -> Result<CsvImportResult, CsvImportError> {
        let mut records = reader.records();

        let header = if has_header {
            match records.next() {
                Some(Ok(header)) => Some(header),
                Some(Err(source)) => {
                    return Err(CsvImportError::Header {
                        path: path.to_path_buf(),
                        source,
                    });
                }
                None => return Err(CsvImportError::EmptyFile(path.to_path_buf())),
            }
        } else {
            None
        };
        let mapping = map_columns(table, header.as_ref());

        let statement = self
            .client
            .prepare_insert_statement(table)
            .await
            .map_err(|source| CsvImportError::Prepare {
                table: table.name.clone(),
                source,
            })?;

        let mut result = CsvImportResult::default();
        self.report_progress(
            &table.name,
            position,
            &result,
            format!("Importing {} into {}", path.display(), table.name),
        );

        for record in records {
            result.rows_processed += 1;
            let line = result.rows_processed + u64::from(has_header);

            let record = match record {
                Ok(record) => record,
                Err(source) if matches!(source.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(CsvImportError::Read {
                        path: path.to_path_buf(),
                        line,
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!(table = %table.name, line, error = %e, "failed to read CSV record, skipping");
                    result.add_error(format!("line {}: failed to read CSV record: {}", line, e));
                    continue;
                }
            };

            let fatal = |source| CsvImportError::Fatal {
                path: path.to_path_buf(),
                source,
            };
            let Some(values) = self
                .build_row(table, &record, &mapping, line, &mut result)
                .await
                .map_err(fatal)?
            else {
                continue;
            };

            match self.client.execute_insert(&statement, &values).await {
                Ok(_) => result.rows_added += 1,
                Err(e) if e.is_fatal() => return Err(fatal(e)),
                Err(e) => {
                    tracing::warn!(table = %table.name, line, error = %e, "failed to insert record");
                    result.add_error(format!(
                        "line {}: failed to insert record into {}: {}",
                        line, table.name, e
                    ));
                }
            }
        }

        self.report_progress(
            &table.name,
            position,
            &result,
            format!(
                "Completed: {} ({} added, {} parents created, {} errors)",
                table.name, result.rows_added, result.parents_created, result.error_count
            ),
        );
        Ok(result)
    }

    /// Resolve parents and convert one record. `Ok(None)` means the row
    /// was rejected and counted; `Err` aborts the import.
    async fn build_row(
        &self,
        table: &TableInfo,
        record: &StringRecord,
        mapping: &[Option<usize>],
        line: u64,
        result: &mut CsvImportResult,
    ) -> Result<Option<Vec<Value>>, DbseedError> {
        let mut values = Vec::with_capacity(table.columns.len());

        for (column, source) in table.columns.iter().zip(mapping.iter().copied()) {
            let raw = source.and_then(|i| record.get(i)).unwrap_or("");

            if !raw.is_empty() {
                if let Some(fk) = table.foreign_key_for(&column.name) {
                    let parent = self.schema.get(&fk.foreign_table_name).ok_or_else(|| {
                        DbseedError::MissingForeignTable {
                            table: fk.foreign_table_name.clone(),
                            constraint: fk.constraint_name.clone(),
                        }
                    })?;

                    match self
                        .client
                        .ensure_parent_record_exists(parent, &fk.foreign_column_name, raw, &self.schema)
                        .await
                    {
                        Ok(created) => result.parents_created += created as u64,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            tracing::warn!(
                                table = %table.name,
                                line,
                                parent = %parent.name,
                                value = %raw,
                                error = %e,
                                "failed to ensure parent record, skipping row"
                            );
                            result.add_error(format!(
                                "line {}: failed to ensure parent record exists for {}.{} (value: {}): {}",
                                line, fk.foreign_table_name, fk.foreign_column_name, raw, e
                            ));
                            return Ok(None);
                        }
                    }
                }
            }

            let value = convert_to_db_type(raw, column).unwrap_or_else(|e| {
                tracing::warn!(table = %table.name, line, error = %e, "conversion failed, using NULL");
                result.add_error(format!("line {}: {}", line, e));
                Value::Null
            });
            values.push(value);
        }

        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbseed_core::memory::MemoryClient;
    use dbseed_core::{ColumnDataType, ColumnInfo};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn schema_of(tables: Vec<TableInfo>) -> SchemaModel {
        tables.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    fn organizations() -> TableInfo {
        TableInfo::new("organizations")
            .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("name", ColumnDataType::String))
            .with_primary_key(["id"])
    }

    fn users(organization_id: ColumnInfo) -> TableInfo {
        TableInfo::new("users")
            .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("name", ColumnDataType::String))
            .with_column(ColumnInfo::new("email", ColumnDataType::String).nullable())
            .with_column(organization_id)
            .with_primary_key(["id"])
            .with_unique_key(["email"])
            .with_foreign_key("fk_organization_id", "organization_id", "organizations", "id")
    }

    fn posts() -> TableInfo {
        TableInfo::new("posts")
            .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("user_id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("title", ColumnDataType::String))
            .with_primary_key(["id"])
            .with_foreign_key("fk_user_id", "user_id", "users", "id")
    }

    fn blog_schema() -> SchemaModel {
        schema_of(vec![
            posts(),
            users(ColumnInfo::new("organization_id", ColumnDataType::Integer).nullable()),
            organizations(),
        ])
    }

    fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn importer(schema: SchemaModel) -> (Arc<MemoryClient>, CsvImporter) {
        let client = Arc::new(MemoryClient::new(schema.clone()));
        let importer = CsvImporter::new(client.clone(), schema);
        (client, importer)
    }

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[tokio::test]
    async fn test_import_without_header_maps_by_position() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "users.csv",
            "1,AliceNoHeader,alice_no_header@example.com\n2,Bob,bob@example.com\n",
        );
        let (client, importer) = importer(blog_schema());

        let summary = importer.import_csv_files(dir.path(), false).await.unwrap();

        assert_eq!(client.row_count("users"), 2);
        assert_eq!(
            client.rows("users")[0],
            vec![
                Value::Int64(1),
                text("AliceNoHeader"),
                text("alice_no_header@example.com"),
                Value::Null,
            ]
        );
        let users = &summary.tables["users"];
        assert_eq!(users.rows_processed, 2);
        assert_eq!(users.rows_added, 2);
        assert_eq!(users.error_count, 0);
    }

    #[tokio::test]
    async fn test_header_matching_ignores_case() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "users.csv", "EMAIL,Name,ID\ncarol@example.com,Carol,7\n");
        let (client, importer) = importer(blog_schema());

        importer.import_csv_files(dir.path(), true).await.unwrap();

        assert_eq!(
            client.rows("users"),
            vec![vec![
                Value::Int64(7),
                text("Carol"),
                text("carol@example.com"),
                Value::Null,
            ]]
        );
    }

    #[tokio::test]
    async fn test_short_rows_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "users.csv", "id,name,email,organization_id\n3\n4,Dana\n");
        let (client, importer) = importer(blog_schema());

        let summary = importer.import_csv_files(dir.path(), true).await.unwrap();

        assert_eq!(summary.tables["users"].rows_added, 2);
        assert_eq!(
            client.rows("users")[0],
            vec![Value::Int64(3), text(""), Value::Null, Value::Null]
        );
    }

    #[tokio::test]
    async fn test_missing_parent_is_synthesized_once() {
        let schema = schema_of(vec![
            posts(),
            users(ColumnInfo::new("organization_id", ColumnDataType::Integer).with_default("42")),
            organizations(),
        ]);
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "posts.csv", "id,user_id,title\n1,999,Hello\n");
        let (client, importer) = importer(schema);

        let first = importer.import_csv_files(dir.path(), true).await.unwrap();
        assert_eq!(first.tables["posts"].parents_created, 2);
        assert_eq!(first.skipped, vec!["organizations", "users"]);
        assert_eq!(client.rows("users")[0][0], Value::Int64(999));
        assert_eq!(client.rows("users")[0][3], Value::Int64(42));
        assert_eq!(client.rows("organizations")[0][0], Value::Int64(42));

        let second = importer.import_csv_files(dir.path(), true).await.unwrap();
        assert_eq!(second.tables["posts"].parents_created, 0);
        assert_eq!(client.row_counts().values().copied().collect::<Vec<_>>(), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_tables_follow_dependency_order() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "posts.csv", "id,user_id,title\n1,1,First\n");
        write_csv(&dir, "users.csv", "id,name,email,organization_id\n1,Ann,ann@example.com,5\n");
        write_csv(&dir, "organizations.csv", "id,name\n5,Acme\n");
        let (client, importer) = importer(blog_schema());

        let summary = importer.import_csv_files(dir.path(), true).await.unwrap();

        assert_eq!(summary.order, vec!["organizations", "users", "posts"]);
        assert_eq!(
            summary.tables.keys().collect::<Vec<_>>(),
            vec!["organizations", "users", "posts"]
        );
        assert_eq!(summary.total_parents_created(), 0);
        assert_eq!(summary.total_rows_added(), 3);
        assert_eq!(client.rows("organizations")[0][1], text("Acme"));
    }

    #[tokio::test]
    async fn test_unknown_csv_is_ignored() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "unknown_table.csv", "a,b\n1,2\n");
        write_csv(&dir, "notes.txt", "not a csv");
        let (_client, importer) = importer(blog_schema());

        let summary = importer.import_csv_files(dir.path(), true).await.unwrap();

        assert!(summary.tables.is_empty());
        assert_eq!(summary.skipped, vec!["organizations", "users", "posts"]);
    }

    #[tokio::test]
    async fn test_missing_referenced_table_is_fatal() {
        let schema = schema_of(vec![
            TableInfo::new("visits")
                .with_column(ColumnInfo::new("ghost_id", ColumnDataType::Integer))
                .with_foreign_key("fk_ghost", "ghost_id", "ghosts", "id"),
        ]);
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "visits.csv", "ghost_id\n1\n");
        let (_client, importer) = importer(schema);

        let err = importer.import_csv_files(dir.path(), true).await.unwrap_err();

        match err {
            CsvImportError::Fatal { source, .. } => assert!(matches!(
                source,
                DbseedError::MissingForeignTable { ref table, .. } if table == "ghosts"
            )),
            other => panic!("expected fatal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_conversion_failure_becomes_null() {
        let schema = schema_of(vec![
            TableInfo::new("metrics")
                .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
                .with_column(ColumnInfo::new("score", ColumnDataType::Float).nullable())
                .with_primary_key(["id"]),
        ]);
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "metrics.csv", "id,score\n1,not-a-number\n");
        let (client, importer) = importer(schema);

        let result = importer.import_single_csv(&path, "metrics", true).await.unwrap();

        assert_eq!(result.rows_added, 1);
        assert_eq!(result.error_count, 1);
        assert!(result.errors[0].contains("not-a-number"));
        assert_eq!(client.rows("metrics"), vec![vec![Value::Int64(1), Value::Null]]);
    }

    #[tokio::test]
    async fn test_insert_failures_are_counted_and_import_continues() {
        let schema = schema_of(vec![
            TableInfo::new("users")
                .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
                .with_column(ColumnInfo::new("name", ColumnDataType::String))
                .with_column(ColumnInfo::new("email", ColumnDataType::String))
                .with_unique_key(["email"]),
        ]);
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "users.csv",
            "id,name,email\n1,Ann,dup@example.com\n2,Bob,dup@example.com\n3,Cy,cy@example.com\n",
        );
        let (client, importer) = importer(schema);

        let summary = importer.import_csv_files(dir.path(), true).await.unwrap();

        let users = &summary.tables["users"];
        assert_eq!(users.rows_processed, 3);
        assert_eq!(users.rows_added, 2);
        assert_eq!(users.error_count, 1);
        assert_eq!(client.row_count("users"), 2);
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_any_insert() {
        let schema = schema_of(vec![
            TableInfo::new("a")
                .with_column(ColumnInfo::new("b_id", ColumnDataType::Integer))
                .with_foreign_key("fk_a_b", "b_id", "b", "b_id"),
            TableInfo::new("b")
                .with_column(ColumnInfo::new("b_id", ColumnDataType::Integer))
                .with_foreign_key("fk_b_a", "b_id", "a", "b_id"),
        ]);
        let dir = TempDir::new().unwrap();
        let (_client, importer) = importer(schema);

        let err = importer.import_csv_files(dir.path(), true).await.unwrap_err();
        assert!(matches!(err, CsvImportError::Ordering(GraphError::CycleDetected { .. })));
        assert!(err.to_string().contains("cycle detected"));
    }

    #[tokio::test]
    async fn test_missing_directory_and_table() {
        let (_client, importer) = importer(blog_schema());

        let err = importer
            .import_csv_files(Path::new("/definitely/not/here"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, CsvImportError::Directory { .. }));

        let err = importer
            .import_single_csv(Path::new("x.csv"), "comments", true)
            .await
            .unwrap_err();
        assert!(matches!(err, CsvImportError::TableNotFound(ref t) if t == "comments"));
    }

    #[tokio::test]
    async fn test_progress_is_reported_per_table() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "organizations.csv", "id,name\n1,Acme\n");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (_client, importer) = importer(blog_schema());
        let importer = importer.with_progress_callback(Box::new(move |progress| {
            sink.lock().unwrap().push((progress.table_index, progress.message));
        }));

        importer.import_csv_files(dir.path(), true).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, 1);
        assert!(seen[1].1.starts_with("Completed: organizations (1 added"));
    }

    fn metrics_schema() -> SchemaModel {
        schema_of(vec![
            TableInfo::new("metrics")
                .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
                .with_column(ColumnInfo::new("score", ColumnDataType::Float).nullable())
                .with_primary_key(["id"]),
        ])
    }

    /// Hands out its bytes, then fails every read
    struct BrokenDisk {
        data: std::io::Cursor<Vec<u8>>,
    }

    impl io::Read for BrokenDisk {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match io::Read::read(&mut self.data, buf)? {
                0 => Err(io::Error::other("device not ready")),
                n => Ok(n),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_row_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        fs::write(&path, b"id,score\n1,\xff\xfe\n2,3.5\n").unwrap();
        let (client, importer) = importer(metrics_schema());

        let result = importer.import_single_csv(&path, "metrics", true).await.unwrap();

        assert_eq!(result.rows_processed, 2);
        assert_eq!(result.rows_added, 1);
        assert_eq!(result.error_count, 1);
        assert!(result.errors[0].starts_with("line 2: failed to read CSV record"));
        assert_eq!(client.rows("metrics"), vec![vec![Value::Int64(2), Value::Float64(3.5)]]);
    }

    #[tokio::test]
    async fn test_io_failure_mid_file_aborts() {
        let (client, importer) = importer(metrics_schema());
        let reader = reader_builder().from_reader(BrokenDisk {
            data: std::io::Cursor::new(b"id,score\n1,0.5\n".to_vec()),
        });
        let table = importer.schema()["metrics"].clone();

        let err = importer
            .import_records(reader, Path::new("metrics.csv"), &table, true, (1, 1))
            .await
            .unwrap_err();

        match err {
            CsvImportError::Read { line, ref source, .. } => {
                assert_eq!(line, 3);
                assert!(matches!(source.kind(), csv::ErrorKind::Io(_)));
            }
            other => panic!("expected read error, got {other:?}"),
        }
        assert_eq!(client.row_count("metrics"), 1);
    }

    #[tokio::test]
    async fn test_empty_file_needs_a_header() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "metrics.csv", "");
        let (_client, importer) = importer(metrics_schema());

        let err = importer.import_single_csv(&path, "metrics", true).await.unwrap_err();
        assert!(matches!(err, CsvImportError::EmptyFile(ref p) if p == &path));

        let result = importer.import_single_csv(&path, "metrics", false).await.unwrap();
        assert_eq!(result, CsvImportResult::default());
    }

    #[tokio::test]
    async fn test_header_matching_folds_unicode_case() {
        let schema = schema_of(vec![
            TableInfo::new("cities")
                .with_column(ColumnInfo::new("straße", ColumnDataType::String))
                .with_column(ColumnInfo::new("ÉTAGE", ColumnDataType::Integer)),
        ]);
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "cities.csv", "\u{feff}étage,STRAẞE\n3,Hauptstraße\n");
        let (client, importer) = importer(schema);

        importer.import_single_csv(&path, "cities", true).await.unwrap();

        assert_eq!(
            client.rows("cities"),
            vec![vec![text("Hauptstraße"), Value::Int64(3)]]
        );
    }

    #[tokio::test]
    async fn test_self_referencing_table_imports_without_ordering() {
        let schema = schema_of(vec![
            TableInfo::new("employees")
                .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
                .with_column(ColumnInfo::new("manager_id", ColumnDataType::Integer))
                .with_primary_key(["id"])
                .with_foreign_key("fk_manager", "manager_id", "employees", "id"),
        ]);
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "employees.csv", "id,manager_id\n5,9\n");
        let (client, importer) = importer(schema);

        let result = importer.import_single_csv(&path, "employees", true).await.unwrap();

        assert_eq!(result.rows_added, 1);
        assert_eq!(result.parents_created, 2);
        assert_eq!(client.row_count("employees"), 3);
    }
}

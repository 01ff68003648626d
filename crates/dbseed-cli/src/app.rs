//! One import run: connect, introspect the schema, load the CSV directory
//! and log a per-table summary.

use std::sync::Arc;

use anyhow::Context;
use dbseed_core::DatabaseClient;
use dbseed_core::memory::MemoryClient;
use dbseed_drivers::{ConnectionConfig, DriverRegistry};
use dbseed_interchange::{CsvImporter, ImportSummary};

use crate::config::ImportConfig;

/// Connect, introspect, import every CSV file and close the connection.
///
/// With `dry_run` the schema still comes from the database but rows go to
/// an empty in-memory copy of it.
pub async fn run_app(
    config: &ImportConfig,
    registry: &DriverRegistry,
) -> anyhow::Result<ImportSummary> {
    let connection = ConnectionConfig::new(config.db_type.as_str(), &config.connection_string);
    tracing::info!(
        db_type = %config.db_type,
        connection = %connection.redacted_connection_string(),
        schema = %config.schema,
        "connecting to database"
    );

    let client = registry
        .connect(&connection)
        .await
        .with_context(|| format!("failed to connect to {} database", config.db_type))?;

    let result = import(config, client.clone()).await;

    if let Err(e) = client.close().await {
        tracing::warn!(error = %e, "failed to close database connection");
    }
    result
}

async fn import(
    config: &ImportConfig,
    client: Arc<dyn DatabaseClient>,
) -> anyhow::Result<ImportSummary> {
    let schema = client
        .get_schema_info(&config.schema)
        .await
        .with_context(|| format!("failed to get schema info for {}", config.schema))?;
    tracing::info!(tables = schema.len(), "schema introspected");

    let target: Arc<dyn DatabaseClient> = if config.dry_run {
        tracing::info!("dry run: importing into an in-memory copy of the schema");
        Arc::new(MemoryClient::new(schema.clone()))
    } else {
        client
    };

    let summary = CsvImporter::new(target, schema)
        .import_csv_files(&config.csv_dir, config.has_header)
        .await
        .with_context(|| format!("failed to import CSV files from {}", config.csv_dir.display()))?;

    for (table, result) in &summary.tables {
        tracing::info!(
            table = %table,
            rows_processed = result.rows_processed,
            rows_added = result.rows_added,
            parents_created = result.parents_created,
            errors = result.error_count,
            "table imported"
        );
    }
    tracing::info!(
        tables = summary.tables.len(),
        skipped = summary.skipped.len(),
        rows_added = summary.total_rows_added(),
        parents_created = summary.total_parents_created(),
        errors = summary.total_errors(),
        "import complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dbseed_core::{
        ColumnDataType, ColumnInfo, DatabaseDriver, DbseedError, SchemaModel, TableInfo,
    };
    use dbseed_drivers::DatabaseKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Driver that hands out one shared in-memory database
    struct MemoryDriver {
        client: Arc<MemoryClient>,
    }

    #[async_trait]
    impl DatabaseDriver for MemoryDriver {
        fn id(&self) -> &'static str {
            "postgres"
        }

        fn name(&self) -> &'static str {
            "memory"
        }

        fn display_name(&self) -> &'static str {
            "In-memory"
        }

        fn default_port(&self) -> Option<u16> {
            None
        }

        async fn connect(
            &self,
            _config: &ConnectionConfig,
        ) -> dbseed_core::Result<Arc<dyn DatabaseClient>> {
            Ok(self.client.clone())
        }
    }

    fn shop_schema() -> SchemaModel {
        let customers = TableInfo::new("customers")
            .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("name", ColumnDataType::String))
            .with_primary_key(["id"]);
        let orders = TableInfo::new("orders")
            .with_column(ColumnInfo::new("id", ColumnDataType::Integer))
            .with_column(ColumnInfo::new("customer_id", ColumnDataType::Integer))
            .with_primary_key(["id"])
            .with_foreign_key("fk_customer", "customer_id", "customers", "id");
        [orders, customers]
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect()
    }

    fn setup(dry_run: bool) -> (TempDir, Arc<MemoryClient>, DriverRegistry, ImportConfig) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("orders.csv"), "id,customer_id\n1,10\n2,10\n").unwrap();

        let client = Arc::new(MemoryClient::new(shop_schema()));
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(MemoryDriver {
            client: client.clone(),
        }));

        let config = ImportConfig {
            csv_dir: dir.path().to_path_buf(),
            dry_run,
            ..ImportConfig::default()
        };
        (dir, client, registry, config)
    }

    #[tokio::test]
    async fn test_run_app_imports_and_synthesizes_parents() {
        let (_dir, client, registry, config) = setup(false);

        let summary = run_app(&config, &registry).await.unwrap();

        assert_eq!(summary.order, vec!["customers", "orders"]);
        assert_eq!(summary.skipped, vec!["customers"]);
        assert_eq!(summary.total_rows_added(), 2);
        assert_eq!(summary.total_parents_created(), 1);
        assert_eq!(client.row_count("orders"), 2);
        assert_eq!(client.row_count("customers"), 1);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_database_untouched() {
        let (_dir, client, registry, config) = setup(true);

        let summary = run_app(&config, &registry).await.unwrap();

        assert_eq!(summary.total_rows_added(), 2);
        assert_eq!(summary.total_parents_created(), 1);
        assert_eq!(client.row_count("orders"), 0);
        assert_eq!(client.row_count("customers"), 0);
    }

    #[tokio::test]
    async fn test_unregistered_engine_fails_to_connect() {
        let (_dir, _client, registry, config) = setup(false);
        let config = ImportConfig {
            db_type: DatabaseKind::Mysql,
            ..config
        };

        let err = run_app(&config, &registry).await.unwrap_err();

        assert!(err.to_string().contains("failed to connect to mysql database"));
        assert!(matches!(
            err.downcast_ref::<DbseedError>(),
            Some(DbseedError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_csv_directory_is_reported() {
        let (_dir, _client, registry, config) = setup(false);
        let config = ImportConfig {
            csv_dir: "/no/such/csv/dir".into(),
            ..config
        };

        let err = run_app(&config, &registry).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to read CSV directory"));
    }
}

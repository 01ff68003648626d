//! PostgreSQL driver implementation

use async_trait::async_trait;
use dbseed_core::{ConnectionConfig, DatabaseClient, DatabaseDriver, DbseedError, Result};
use std::sync::Arc;

use crate::PostgresConnection;

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn id(&self) -> &'static str {
        "postgres"
    }

    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(5432)
    }

    #[tracing::instrument(skip(self, config), fields(connection = %config.redacted_connection_string()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
        let conn = PostgresConnection::connect(&config.connection_string)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to PostgreSQL database");
                match e {
                    DbseedError::Configuration(_) => e,
                    other => DbseedError::Connection(format!(
                        "Failed to connect to PostgreSQL database: {}",
                        other
                    )),
                }
            })?;

        tracing::info!("PostgreSQL connection created");
        Ok(Arc::new(conn))
    }
}

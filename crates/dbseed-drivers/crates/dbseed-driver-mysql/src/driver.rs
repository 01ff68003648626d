//! MySQL driver implementation

use async_trait::async_trait;
use dbseed_core::{ConnectionConfig, DatabaseClient, DatabaseDriver, DbseedError, Result};
use std::sync::Arc;

use crate::MySqlConnection;

/// MySQL database driver
pub struct MySqlDriver;

impl MySqlDriver {
    /// Create a new MySQL driver instance
    pub fn new() -> Self {
        tracing::debug!("MySQL driver initialized");
        Self
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn id(&self) -> &'static str {
        "mysql"
    }

    fn name(&self) -> &'static str {
        "mysql"
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(3306)
    }

    #[tracing::instrument(skip(self, config), fields(connection = %config.redacted_connection_string()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
        let conn = MySqlConnection::connect(&config.connection_string)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to MySQL database");
                match e {
                    DbseedError::Configuration(_) => e,
                    other => DbseedError::Connection(format!(
                        "Failed to connect to MySQL database: {}",
                        other
                    )),
                }
            })?;

        tracing::info!("MySQL connection created");
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_dsn_is_a_configuration_error() {
        let config = ConnectionConfig::new("mysql", "root:pw@tcp(localhost:3306)");
        let err = MySqlDriver::new().connect(&config).await.err().unwrap();
        assert!(matches!(err, DbseedError::Configuration(_)));
    }

    #[test]
    fn test_driver_identity() {
        let driver = MySqlDriver::default();
        assert_eq!(driver.id(), "mysql");
        assert_eq!(driver.default_port(), Some(3306));
        assert_eq!(driver.ping_sql(), "SELECT 1");
    }
}

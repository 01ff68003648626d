//! DB2 driver registration

use async_trait::async_trait;
use dbseed_core::{ConnectionConfig, DatabaseClient, DatabaseDriver, DbseedError, Result};
use std::sync::Arc;

/// IBM DB2 database driver
pub struct Db2Driver;

impl Db2Driver {
    pub fn new() -> Self {
        tracing::debug!("DB2 driver initialized");
        Self
    }
}

impl Default for Db2Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for Db2Driver {
    fn id(&self) -> &'static str {
        "db2"
    }

    fn name(&self) -> &'static str {
        "db2"
    }

    fn display_name(&self) -> &'static str {
        "IBM DB2"
    }

    fn default_port(&self) -> Option<u16> {
        Some(50000)
    }

    fn ping_sql(&self) -> &'static str {
        "SELECT 1 FROM SYSIBM.SYSDUMMY1"
    }

    /// No DB2 wire transport ships with this build. A [`crate::Db2Client`]
    /// can still be built over any connection that speaks DB2 SQL.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
        tracing::error!(
            connection = %config.redacted_connection_string(),
            "DB2 connection requested but no DB2 transport is available"
        );
        Err(DbseedError::NotSupported(
            "DB2 support not compiled into this build".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_reports_missing_support() {
        let config = ConnectionConfig::new("db2", "DATABASE=sample;HOSTNAME=localhost;PWD=secret");
        let err = Db2Driver::new().connect(&config).await.err().unwrap();
        assert!(matches!(err, DbseedError::NotSupported(_)));
        assert!(err.to_string().contains("DB2 support not compiled"));
    }
}

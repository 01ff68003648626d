//! dbseed - load a directory of CSV files into a relational database,
//! parents first, creating any missing foreign-key parent rows on the way.

mod app;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use dbseed_drivers::{DatabaseKind, DriverRegistry};

use crate::config::{ConfigOverrides, ImportConfig};
use crate::logging::{LogFormat, LoggingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "dbseed",
    version,
    about = "Foreign-key aware CSV importer for PostgreSQL, MySQL and DB2"
)]
struct Cli {
    /// Database engine: postgres, mysql or db2
    #[arg(long, value_name = "ENGINE")]
    db_type: Option<DatabaseKind>,

    /// Connection string (URL, key=value or MySQL DSN)
    #[arg(long = "db", env = "DBSEED_DB", value_name = "CONNECTION", hide_env_values = true)]
    connection_string: Option<String>,

    /// Directory containing one <table>.csv per table
    #[arg(long = "csv", value_name = "DIR")]
    csv_dir: Option<PathBuf>,

    /// Whether the CSV files start with a header row
    #[arg(long = "header", value_name = "BOOL", action = ArgAction::Set)]
    has_header: Option<bool>,

    /// Schema (or MySQL database) to introspect
    #[arg(long)]
    schema: Option<String>,

    /// TOML file with defaults for the options above
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Import into an in-memory copy of the schema without writing anything
    #[arg(long)]
    dry_run: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_type: self.db_type,
            connection_string: self.connection_string.clone(),
            csv_dir: self.csv_dir.clone(),
            has_header: self.has_header,
            schema: self.schema.clone(),
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(LoggingConfig::with_format(cli.log_format)) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    tracing::info!("dbseed started.");
    match run(&cli).await {
        Ok(()) => {
            tracing::info!("finished successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "dbseed failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = ImportConfig::load(cli.config.as_deref(), cli.overrides())?;
    let registry = DriverRegistry::with_defaults();
    app::run_app(&config, &registry).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "dbseed",
            "--db-type",
            "mysql",
            "--db",
            "root:secret@tcp(localhost:3306)/shop",
            "--csv",
            "./data",
            "--header",
            "false",
            "--schema",
            "shop",
            "--dry-run",
            "--log-format",
            "json",
        ])
        .unwrap();

        let config = ImportConfig::load(None, cli.overrides()).unwrap();
        assert_eq!(
            config,
            ImportConfig {
                db_type: DatabaseKind::Mysql,
                connection_string: "root:secret@tcp(localhost:3306)/shop".to_string(),
                csv_dir: PathBuf::from("./data"),
                has_header: false,
                schema: "shop".to_string(),
                dry_run: true,
            }
        );
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let err = Cli::try_parse_from(["dbseed", "--db-type", "oracle"]).unwrap_err();
        assert!(err.to_string().contains("unsupported database type: oracle"));
    }

    #[test]
    fn test_header_requires_a_value() {
        assert!(Cli::try_parse_from(["dbseed", "--header"]).is_err());
        let cli = Cli::try_parse_from(["dbseed", "--header", "true"]).unwrap();
        assert_eq!(cli.has_header, Some(true));
    }
}

//! MySQL connection implementation

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Timelike};
use dbseed_core::{
    ColumnMeta, Connection, DbseedError, QueryResult, Result, Row, StatementResult, Value,
};
use mysql_async::{
    Conn, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Row as MySqlRow,
    consts::ColumnType, prelude::*,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// Server error raised for a duplicate primary or unique key
const ER_DUP_ENTRY: u16 = 1062;

/// Parse either a `mysql://` URL or a Go-style DSN
/// (`user:pass@tcp(host:port)/dbname?params`) into connection options.
pub fn parse_connection_string(conn_str: &str) -> Result<Opts> {
    let trimmed = conn_str.trim();
    if trimmed.starts_with("mysql://") {
        return Opts::from_url(trimmed)
            .map_err(|e| DbseedError::Configuration(format!("invalid MySQL URL: {}", e)));
    }

    let slash = trimmed.rfind('/').ok_or_else(|| {
        DbseedError::Configuration(
            "invalid MySQL DSN: missing the slash separating the database name".into(),
        )
    })?;
    let (prefix, suffix) = (&trimmed[..slash], &trimmed[slash + 1..]);

    let (database, params) = match suffix.split_once('?') {
        Some((db, params)) => (db, Some(params)),
        None => (suffix, None),
    };
    if let Some(params) = params {
        tracing::debug!(params = %params, "ignoring MySQL DSN parameters");
    }

    let (credentials, address) = match prefix.rfind('@') {
        Some(at) => (Some(&prefix[..at]), &prefix[at + 1..]),
        None => (None, prefix),
    };

    let (host, port) = parse_address(address)?;
    let mut builder = OptsBuilder::default().ip_or_hostname(host).tcp_port(port);

    if let Some(credentials) = credentials {
        let (user, pass) = match credentials.split_once(':') {
            Some((user, pass)) => (user, Some(pass)),
            None => (credentials, None),
        };
        builder = builder.user(Some(user)).pass(pass);
    }
    if !database.is_empty() {
        builder = builder.db_name(Some(database));
    }

    Ok(builder.into())
}

fn parse_address(address: &str) -> Result<(String, u16)> {
    let inner = match address {
        "" | "tcp" => return Ok(("127.0.0.1".to_string(), 3306)),
        other => other
            .strip_prefix("tcp(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| {
                DbseedError::Configuration(format!(
                    "unsupported MySQL DSN address '{}', expected tcp(host:port)",
                    other
                ))
            })?,
    };

    match inner.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DbseedError::Configuration(format!("invalid port in MySQL DSN: '{}'", port))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((inner.to_string(), 3306)),
    }
}

pub(crate) fn map_mysql_error(context: &str, err: mysql_async::Error) -> DbseedError {
    match err {
        mysql_async::Error::Server(ref server) if server.code == ER_DUP_ENTRY => {
            DbseedError::UniqueViolation(format!("{}: {}", context, server.message))
        }
        mysql_async::Error::Server(server) => DbseedError::Query(format!(
            "{}: {} (error {}, SQLSTATE {})",
            context, server.message, server.code, server.state
        )),
        mysql_async::Error::Io(e) => DbseedError::Connection(format!("{}: {}", context, e)),
        other => DbseedError::Query(format!("{}: {}", context, other)),
    }
}

/// MySQL connection wrapper
pub struct MySqlConnection {
    pool: Pool,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Connect using a `mysql://` URL or a Go-style DSN
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let opts = parse_connection_string(conn_str)?;
        tracing::info!(
            host = %opts.ip_or_hostname(),
            port = opts.tcp_port(),
            database = ?opts.db_name(),
            "connecting to MySQL database"
        );

        let constraints = PoolConstraints::new(1, 1).ok_or_else(|| {
            DbseedError::Connection(
                "Failed to configure MySQL pool constraints (min=1, max=1)".into(),
            )
        })?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_reset_connection(false);
        let opts: Opts = OptsBuilder::from_opts(opts).pool_opts(pool_opts).into();

        let pool = Pool::new(opts);
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| DbseedError::Connection(format!("Failed to connect to MySQL: {}", e)))?;
        conn.ping()
            .await
            .map_err(|e| DbseedError::Connection(format!("Failed to ping MySQL: {}", e)))?;
        drop(conn);

        tracing::info!("MySQL connection established");
        Ok(Self {
            pool,
            closed: AtomicBool::new(false),
        })
    }

    async fn get_conn(&self) -> Result<Conn> {
        if self.is_closed() {
            return Err(DbseedError::Connection("connection is closed".into()));
        }
        self.pool
            .get_conn()
            .await
            .map_err(|e| DbseedError::Connection(format!("Failed to get MySQL connection: {}", e)))
    }
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(value_to_mysql).collect())
    }
}

fn date_value(date: NaiveDate, hour: u32, min: u32, sec: u32, micro: u32) -> mysql_async::Value {
    mysql_async::Value::Date(
        date.year() as u16,
        date.month() as u8,
        date.day() as u8,
        hour as u8,
        min as u8,
        sec as u8,
        micro,
    )
}

/// Convert our Value into a bind parameter
pub(crate) fn value_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(v) => mysql_async::Value::Int(*v as i64),
        Value::Int16(v) => mysql_async::Value::Int(*v as i64),
        Value::Int32(v) => mysql_async::Value::Int(*v as i64),
        Value::Int64(v) => mysql_async::Value::Int(*v),
        Value::Float32(v) => mysql_async::Value::Float(*v),
        Value::Float64(v) => mysql_async::Value::Double(*v),
        Value::Decimal(v) | Value::String(v) => mysql_async::Value::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => mysql_async::Value::Bytes(v.clone()),
        Value::Date(d) => date_value(*d, 0, 0, 0, 0),
        Value::Time(t) => mysql_async::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        Value::DateTime(dt) => date_value(
            dt.date(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.nanosecond() / 1_000,
        ),
        Value::DateTimeUtc(dt) => {
            let naive = dt.naive_utc();
            date_value(
                naive.date(),
                naive.hour(),
                naive.minute(),
                naive.second(),
                naive.nanosecond() / 1_000,
            )
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",");
            mysql_async::Value::Bytes(joined.into_bytes())
        }
    }
}

/// Convert mysql_async Value to our Value type, using column type metadata
/// to interpret byte strings from the text protocol.
fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => {
                    s.parse::<i64>().map(Value::Int64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Decimal(u.to_string()),
        },
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) else {
                return Value::String(format!("{:04}-{:02}-{:02}", year, month, day));
            };
            if col_type == ColumnType::MYSQL_TYPE_DATE {
                return Value::Date(date);
            }
            date.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                .map(Value::DateTime)
                .unwrap_or(Value::Date(date))
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let mut conn = self.get_conn().await?;
        conn.exec_drop(sql, to_params(params))
            .await
            .map_err(|e| map_mysql_error("Failed to execute statement", e))?;

        let affected_rows = conn.affected_rows();
        tracing::debug!(affected_rows = affected_rows, "statement executed");
        Ok(StatementResult {
            is_query: false,
            affected_rows,
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let mut conn = self.get_conn().await?;

        let mysql_rows: Vec<MySqlRow> = conn
            .exec(sql, to_params(params))
            .await
            .map_err(|e| map_mysql_error("Failed to execute query", e))?;

        let mut columns = Vec::new();
        let mut column_types = Vec::new();
        if let Some(first_row) = mysql_rows.first() {
            for (idx, col) in first_row.columns_ref().iter().enumerate() {
                column_types.push(col.column_type());
                columns.push(ColumnMeta {
                    name: col.name_str().to_string(),
                    data_type: format!("{:?}", col.column_type()),
                    nullable: true,
                    ordinal: idx,
                });
            }
        }
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let rows: Vec<Row> = mysql_rows
            .into_iter()
            .map(|mut mysql_row| {
                let values = column_types
                    .iter()
                    .enumerate()
                    .map(|(idx, col_type)| {
                        let raw = mysql_row
                            .take::<mysql_async::Value, _>(idx)
                            .unwrap_or(mysql_async::Value::NULL);
                        mysql_value_to_value(raw, *col_type)
                    })
                    .collect();
                Row::new(column_names.clone(), values)
            })
            .collect();

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
        })
    }

    async fn prepare(&self, sql: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let statement = conn
            .prep(sql)
            .await
            .map_err(|e| map_mysql_error("Failed to prepare statement", e))?;
        conn.close(statement)
            .await
            .map_err(|e| map_mysql_error("Failed to release prepared statement", e))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("closing MySQL connection pool");
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| DbseedError::Connection(format!("Failed to close MySQL connection: {}", e)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

//! PostgreSQL connection implementation

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use dbseed_core::{
    ColumnMeta, Connection, DbseedError, QueryResult, Result, Row, StatementResult, Value,
    convert::parse_bool,
};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row as PgRow, Statement};

type BoxError = Box<dyn StdError + Sync + Send>;

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match db_error.code().code() {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "22007" => format!("invalid datetime format: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        code => format!("{} (code: {})", message, code),
    }
}

/// Map a driver error onto the dbseed error kinds the importer tells apart
fn map_postgres_error(context: &str, error: tokio_postgres::Error) -> DbseedError {
    let message = format!("{}: {}", context, format_postgres_error(&error));
    if error.is_closed() {
        return DbseedError::Connection(message);
    }
    match error.as_db_error().map(|db| db.code().code()) {
        Some("23505") => DbseedError::UniqueViolation(message),
        _ => DbseedError::Query(message),
    }
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect using a libpq-style connection string or a
    /// `postgresql://` URL. Any `sslmode` other than `disable` negotiates
    /// TLS through native-tls.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let config: tokio_postgres::Config = conn_str
            .parse()
            .map_err(|e| DbseedError::Configuration(format!("invalid PostgreSQL connection string: {}", e)))?;

        let database = config.get_dbname().unwrap_or_default().to_string();
        let ssl_mode = config.get_ssl_mode();
        tracing::info!(
            database = %database,
            ssl_mode = ?ssl_mode,
            "connecting to PostgreSQL database"
        );

        let client = if ssl_mode == SslMode::Disable {
            let (client, connection) = config
                .connect(NoTls)
                .await
                .map_err(|e| DbseedError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        } else {
            // sslmode=prefer/require encrypt without verifying the server
            // certificate, as libpq does
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| DbseedError::Connection(format!("Failed to build TLS connector: {}", e)))?;
            let (client, connection) = config
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| DbseedError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        };

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DbseedError::Connection(format!("Failed to ping PostgreSQL: {}", e)))?;

        tracing::info!(database = %database, "PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            closed: AtomicBool::new(false),
        })
    }

    async fn prepare_statement(&self, client: &Client, sql: &str) -> Result<Statement> {
        client
            .prepare(sql)
            .await
            .map_err(|e| map_postgres_error("Failed to prepare statement", e))
    }
}

/// Bind values against the parameter types the server inferred
fn bind_params(statement: &Statement, params: &[Value]) -> Vec<PgValue> {
    let param_types = statement.params();
    params
        .iter()
        .enumerate()
        .map(|(i, value)| match param_types.get(i) {
            Some(target_type) => PgValue::from_value_for_type(value, target_type),
            None => PgValue::from_value(value),
        })
        .collect()
}

/// Owned parameter value matched to the server-side parameter type
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    /// A number the target integer type cannot hold; fails when bound
    OutOfRange(String, Type),
}

impl PgValue {
    /// Convert a value into the variant whose binary encoding the target
    /// parameter type expects (e.g. 4 bytes for INT4, not 8 from an i64).
    fn from_value_for_type(value: &Value, target_type: &Type) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => match *target_type {
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::String(v.to_string()),
                _ => PgValue::Bool(*v),
            },
            Value::Int16(v) => Self::coerce_int(*v as i64, target_type),
            Value::Int32(v) => Self::coerce_int(*v as i64, target_type),
            Value::Int64(v) => Self::coerce_int(*v, target_type),
            Value::Float32(v) => Self::coerce_float(*v as f64, target_type),
            Value::Float64(v) => Self::coerce_float(*v, target_type),
            Value::Decimal(v) | Value::String(v) => Self::coerce_string(v, target_type),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Date(v) => match *target_type {
                Type::TIMESTAMP => PgValue::DateTime(v.and_time(chrono::NaiveTime::MIN)),
                Type::TIMESTAMPTZ => PgValue::DateTimeUtc(v.and_time(chrono::NaiveTime::MIN).and_utc()),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::String(v.to_string()),
                _ => PgValue::Date(*v),
            },
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => match *target_type {
                Type::TIMESTAMPTZ => PgValue::DateTimeUtc(v.and_utc()),
                Type::DATE => PgValue::Date(v.date()),
                Type::TIME => PgValue::Time(v.time()),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::String(v.to_string()),
                _ => PgValue::DateTime(*v),
            },
            Value::DateTimeUtc(v) => match *target_type {
                Type::TIMESTAMP => PgValue::DateTime(v.naive_utc()),
                Type::DATE => PgValue::Date(v.date_naive()),
                Type::TIME => PgValue::Time(v.time()),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::String(v.to_rfc3339()),
                _ => PgValue::DateTimeUtc(*v),
            },
            Value::Array(_) => PgValue::String(value.to_string()),
        }
    }

    fn coerce_int(value: i64, target_type: &Type) -> Self {
        match *target_type {
            Type::INT2 => i16::try_from(value)
                .map(PgValue::Int16)
                .unwrap_or_else(|_| PgValue::OutOfRange(value.to_string(), target_type.clone())),
            Type::INT4 => i32::try_from(value)
                .map(PgValue::Int32)
                .unwrap_or_else(|_| PgValue::OutOfRange(value.to_string(), target_type.clone())),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        }
    }

    fn coerce_float(value: f64, target_type: &Type) -> Self {
        match *target_type {
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            Type::INT2 | Type::INT4 | Type::INT8 if value.fract() == 0.0 => {
                if value >= i64::MIN as f64 && value < i64::MAX as f64 {
                    Self::coerce_int(value as i64, target_type)
                } else {
                    PgValue::OutOfRange(value.to_string(), target_type.clone())
                }
            }
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::String(value.to_string()),
            _ => PgValue::Float64(value),
        }
    }

    /// Coerce text into a strongly typed parameter when the prepared
    /// statement provides a concrete target type
    fn coerce_string(value: &str, target_type: &Type) -> Self {
        let fallback = || PgValue::String(value.to_string());
        match *target_type {
            Type::INT2 | Type::INT4 | Type::INT8 => value
                .trim()
                .parse::<i64>()
                .map(|v| Self::coerce_int(v, target_type))
                .unwrap_or_else(|_| fallback()),
            Type::FLOAT4 | Type::FLOAT8 => value
                .trim()
                .parse::<f64>()
                .map(|v| Self::coerce_float(v, target_type))
                .unwrap_or_else(|_| fallback()),
            Type::NUMERIC => PgValue::Numeric(value.trim().to_string()),
            Type::BOOL => parse_bool(value).map(PgValue::Bool).unwrap_or_else(fallback),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| fallback()),
            Type::TIME => chrono::NaiveTime::parse_from_str(value, "%H:%M:%S")
                .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%H:%M:%S%.f"))
                .map(PgValue::Time)
                .unwrap_or_else(|_| fallback()),
            Type::TIMESTAMP | Type::TIMESTAMPTZ => {
                let parsed = chrono::DateTime::parse_from_rfc3339(value)
                    .map(|ts| ts.naive_utc())
                    .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
                    .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok();
                match (parsed, target_type == &Type::TIMESTAMPTZ) {
                    (Some(ts), true) => PgValue::DateTimeUtc(ts.and_utc()),
                    (Some(ts), false) => PgValue::DateTime(ts),
                    (None, _) => fallback(),
                }
            }
            _ => fallback(),
        }
    }

    /// Fallback used when the target type is unknown
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int16(v) => PgValue::Int16(*v),
            Value::Int32(v) => PgValue::Int32(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) => PgValue::Numeric(v.clone()),
            Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Array(_) => PgValue::String(value.to_string()),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<postgres_types::IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::Numeric(v) => {
                encode_numeric(v, out)?;
                Ok(postgres_types::IsNull::No)
            }
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::OutOfRange(v, target) => {
                Err(format!("value {} is out of range for type {}", v, target).into())
            }
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// Write a plain decimal literal (`-12.50`) in the NUMERIC binary format:
/// base-10000 digit groups preceded by count, weight, sign and scale.
fn encode_numeric(text: &str, out: &mut BytesMut) -> std::result::Result<(), BoxError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        out.put_i16(0);
        out.put_i16(0);
        out.put_u16(NUMERIC_NAN);
        out.put_i16(0);
        return Ok(());
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(format!("invalid NUMERIC literal: {}", text).into());
    }

    let int_part = int_part.trim_start_matches('0');
    let dscale = i16::try_from(frac_part.len()).map_err(|_| "NUMERIC scale out of range")?;

    let mut int_digits = "0".repeat((4 - int_part.len() % 4) % 4);
    int_digits.push_str(int_part);
    let mut frac_digits = frac_part.to_string();
    frac_digits.push_str(&"0".repeat((4 - frac_part.len() % 4) % 4));

    let mut groups = Vec::with_capacity((int_digits.len() + frac_digits.len()) / 4);
    for chunk in int_digits.as_bytes().chunks(4).chain(frac_digits.as_bytes().chunks(4)) {
        let group = chunk.iter().fold(0i16, |acc, b| acc * 10 + (b - b'0') as i16);
        groups.push(group);
    }

    let mut weight = (int_digits.len() / 4) as i16 - 1;
    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= leading as i16;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }

    let sign = if negative && !groups.is_empty() { NUMERIC_NEG } else { NUMERIC_POS };
    out.put_i16(groups.len() as i16);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_i16(dscale);
    for group in groups {
        out.put_i16(group);
    }
    Ok(())
}

/// NUMERIC decoded to its exact decimal text
#[derive(Debug)]
struct PgNumericString(String);

impl<'a> FromSql<'a> for PgNumericString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }
        let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;
        if sign == NUMERIC_NAN {
            return Ok(Self("NaN".into()));
        }
        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        let group = |i: i32| -> u16 {
            if i < 0 || i as usize >= ndigits {
                return 0;
            }
            let offset = 8 + i as usize * 2;
            u16::from_be_bytes([raw[offset], raw[offset + 1]])
        };

        let mut text = String::new();
        if sign == NUMERIC_NEG && ndigits > 0 {
            text.push('-');
        }
        if weight < 0 {
            text.push('0');
        } else {
            text.push_str(&group(0).to_string());
            for i in 1..=weight {
                text.push_str(&format!("{:04}", group(i)));
            }
        }
        if dscale > 0 {
            let mut fraction = String::new();
            let mut i = weight + 1;
            while fraction.len() < dscale {
                fraction.push_str(&format!("{:04}", group(i)));
                i += 1;
            }
            fraction.truncate(dscale);
            text.push('.');
            text.push_str(&fraction);
        }
        Ok(Self(text))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw UTF-8 payload of types without a dedicated decoder (domains, enums)
#[derive(Debug)]
struct PgFallbackString(String);

impl<'a> FromSql<'a> for PgFallbackString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn try_get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize, wrap: impl FnOnce(T) -> Value) -> Value {
    row.try_get::<_, Option<T>>(idx)
        .ok()
        .flatten()
        .map(wrap)
        .unwrap_or(Value::Null)
}

/// Convert PostgreSQL row value to our Value type
fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    match row.columns()[idx].type_().name() {
        "bool" => try_get(row, idx, Value::Bool),
        "int2" => try_get(row, idx, Value::Int16),
        "int4" => try_get(row, idx, Value::Int32),
        "int8" => try_get(row, idx, Value::Int64),
        "float4" => try_get(row, idx, Value::Float32),
        "float8" => try_get(row, idx, Value::Float64),
        "text" | "varchar" | "bpchar" | "name" => try_get(row, idx, Value::String),
        "bytea" => try_get(row, idx, Value::Bytes),
        "date" => try_get(row, idx, Value::Date),
        "time" => try_get(row, idx, Value::Time),
        "timestamp" => try_get(row, idx, Value::DateTime),
        "timestamptz" => try_get(row, idx, Value::DateTimeUtc),
        "numeric" => try_get(row, idx, |n: PgNumericString| Value::Decimal(n.0)),
        "_text" | "_varchar" | "_name" => try_get(row, idx, |arr: Vec<String>| {
            Value::Array(arr.into_iter().map(Value::String).collect())
        }),
        _ => try_get(row, idx, |s: PgFallbackString| Value::String(s.0)),
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let client = self.client.lock().await;
        let statement = self.prepare_statement(&client, sql).await?;

        let pg_params = bind_params(&statement, params);
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let affected_rows = client
            .execute(&statement, &param_refs)
            .await
            .map_err(|e| map_postgres_error("Failed to execute statement", e))?;

        tracing::debug!(affected_rows, "statement executed");
        Ok(StatementResult {
            is_query: false,
            affected_rows,
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let client = self.client.lock().await;
        let statement = self.prepare_statement(&client, sql).await?;

        let pg_params = bind_params(&statement, params);
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let pg_rows = client
            .query(&statement, &param_refs)
            .await
            .map_err(|e| map_postgres_error("Failed to execute query", e))?;

        let columns: Vec<ColumnMeta> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, col)| ColumnMeta {
                name: col.name().to_string(),
                data_type: col.type_().name().to_string(),
                nullable: true,
                ordinal,
            })
            .collect();
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let rows: Vec<Row> = pg_rows
            .iter()
            .map(|pg_row| {
                let values = (0..columns.len()).map(|idx| postgres_to_value(pg_row, idx)).collect();
                Row::new(column_names.clone(), values)
            })
            .collect();

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(row_count = rows.len(), execution_time_ms, "query executed successfully");

        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
        })
    }

    async fn prepare(&self, sql: &str) -> Result<()> {
        let client = self.client.lock().await;
        self.prepare_statement(&client, sql).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.try_lock().is_ok_and(|c| c.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encoded(text: &str) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_numeric(text, &mut out).unwrap();
        out.to_vec()
    }

    fn round_trip(text: &str) -> String {
        PgNumericString::from_sql(&Type::NUMERIC, &encoded(text)).unwrap().0
    }

    #[test]
    fn test_numeric_encoding_layout() {
        // 12345.6 => groups [1, 2345, 6000], weight 1, scale 1
        assert_eq!(
            encoded("12345.6"),
            vec![0, 3, 0, 1, 0, 0, 0, 1, 0, 1, 0x09, 0x29, 0x17, 0x70]
        );
        // zero has no digit groups
        assert_eq!(encoded("0"), vec![0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_numeric_round_trips() {
        assert_eq!(round_trip("19.99"), "19.99");
        assert_eq!(round_trip("-0.05"), "-0.05");
        assert_eq!(round_trip("10000"), "10000");
        assert_eq!(round_trip("007.250"), "7.250");
    }

    #[test]
    fn test_integers_narrow_only_when_they_fit() {
        assert!(matches!(PgValue::coerce_int(70, &Type::INT2), PgValue::Int16(70)));
        assert!(matches!(PgValue::coerce_int(-5, &Type::INT4), PgValue::Int32(-5)));
        assert!(matches!(
            PgValue::coerce_int(3_000_000_000, &Type::INT8),
            PgValue::Int64(3_000_000_000)
        ));

        for (value, ty) in [(70_000, Type::INT2), (3_000_000_000, Type::INT4)] {
            let bound = PgValue::coerce_int(value, &ty);
            assert!(matches!(bound, PgValue::OutOfRange(..)), "{value} into {ty}");
            let err = bound.to_sql(&ty, &mut BytesMut::new()).err().unwrap();
            assert!(err.to_string().contains("out of range"));
        }
    }

    #[test]
    fn test_out_of_range_text_and_floats_fail_instead_of_wrapping() {
        let bound = PgValue::from_value_for_type(&Value::String("3000000000".into()), &Type::INT4);
        assert!(matches!(bound, PgValue::OutOfRange(..)));

        assert!(matches!(
            PgValue::from_value_for_type(&Value::Float64(42.0), &Type::INT2),
            PgValue::Int16(42)
        ));
        assert!(matches!(
            PgValue::from_value_for_type(&Value::Float64(1e20), &Type::INT8),
            PgValue::OutOfRange(..)
        ));
    }

    #[test]
    fn test_numeric_rejects_garbage() {
        let mut out = BytesMut::new();
        assert!(encode_numeric("1e5", &mut out).is_err());
        assert!(encode_numeric("abc", &mut out).is_err());
        assert!(encode_numeric("", &mut out).is_err());
    }

    #[test]
    fn test_string_parameters_coerced_to_column_type() {
        assert!(matches!(PgValue::coerce_string("999", &Type::INT4), PgValue::Int32(999)));
        assert!(matches!(PgValue::coerce_string("t", &Type::BOOL), PgValue::Bool(true)));
        assert!(matches!(
            PgValue::coerce_string("2023-05-01T10:00:00+00:00", &Type::TIMESTAMP),
            PgValue::DateTime(_)
        ));
        assert!(matches!(PgValue::coerce_string("abc", &Type::INT8), PgValue::String(_)));
    }

    #[test]
    fn test_values_follow_target_type() {
        assert!(matches!(
            PgValue::from_value_for_type(&Value::Int64(5), &Type::INT2),
            PgValue::Int16(5)
        ));
        assert!(matches!(
            PgValue::from_value_for_type(&Value::Float64(1.5), &Type::NUMERIC),
            PgValue::Numeric(ref s) if s == "1.5"
        ));
        let ts = chrono::Utc::now();
        assert!(matches!(
            PgValue::from_value_for_type(&Value::DateTimeUtc(ts), &Type::TIMESTAMP),
            PgValue::DateTime(_)
        ));
    }
}

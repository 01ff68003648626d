//! Text to typed value conversion for CSV fields and catalog defaults

use crate::{ColumnDataType, ColumnInfo, DbseedError, Result, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert raw CSV text into a value for `column`.
///
/// Empty input resolves in this order: NULL when the column is nullable,
/// then the declared default, then the zero value of the column type.
pub fn convert_to_db_type(raw: &str, column: &ColumnInfo) -> Result<Value> {
    if raw.is_empty() && column.nullable {
        return Ok(Value::Null);
    }

    let text = match (&column.default_value, raw.is_empty()) {
        (Some(default), true) => default.as_str(),
        _ => raw,
    };

    if text.is_empty() && !column.nullable {
        return zero_value(column.data_type).map_err(|reason| conversion_error(column, text, reason));
    }

    parse_typed(text, column.data_type).map_err(|reason| conversion_error(column, text, reason))
}

fn conversion_error(column: &ColumnInfo, value: &str, reason: String) -> DbseedError {
    DbseedError::Conversion {
        column: column.name.clone(),
        value: value.to_string(),
        data_type: column.data_type,
        reason,
    }
}

/// Value used for empty input on a NOT NULL column without a default
pub fn zero_value(data_type: ColumnDataType) -> std::result::Result<Value, String> {
    match data_type {
        ColumnDataType::String => Ok(Value::String(String::new())),
        ColumnDataType::Integer => Ok(Value::Int64(0)),
        ColumnDataType::Float => Ok(Value::Float64(0.0)),
        ColumnDataType::Boolean => Ok(Value::Bool(false)),
        ColumnDataType::Date => zero_date().map(Value::Date),
        ColumnDataType::Timestamp => zero_date().map(|d| Value::DateTime(d.and_time(NaiveTime::MIN))),
        ColumnDataType::Unknown => Err("no zero value for unsupported data type UNKNOWN".to_string()),
    }
}

fn zero_date() -> std::result::Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(1, 1, 1).ok_or_else(|| "zero date out of range".to_string())
}

fn parse_typed(text: &str, data_type: ColumnDataType) -> std::result::Result<Value, String> {
    match data_type {
        ColumnDataType::String => Ok(Value::String(text.to_string())),
        ColumnDataType::Integer => text
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| e.to_string()),
        ColumnDataType::Float => text
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| e.to_string()),
        ColumnDataType::Boolean => parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| "invalid boolean literal".to_string()),
        ColumnDataType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|e| format!("expected YYYY-MM-DD: {}", e)),
        ColumnDataType::Timestamp => parse_timestamp(text),
        ColumnDataType::Unknown => Err("unsupported data type UNKNOWN".to_string()),
    }
}

/// Parse the boolean spellings accepted in CSV input, case-insensitively
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> std::result::Result<Value, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(Value::DateTimeUtc(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(Value::DateTime)
        .map_err(|_| "expected RFC3339 or YYYY-MM-DD HH:MM:SS".to_string())
}

/// Render a value the way it is fed back into a parent-key lookup.
///
/// Integers print in base 10, floats in their shortest form, booleans as
/// `true`/`false` and timestamps as RFC3339.
pub fn value_to_key_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::DateTime(dt) => dt.and_utc().to_rfc3339(),
        Value::Date(d) => d.format(DATE_FORMAT).to_string(),
        other => other.to_string(),
    }
}

//! Random placeholder values for synthesized parent rows

use crate::{ColumnDataType, DbseedError, Result, Value};
use chrono::{Months, Utc};
use rand::Rng;

const RANDOM_WINDOW_MONTHS: u32 = 120;

/// Generate a random value for a unique column of a synthesized row.
///
/// Collisions are possible but unlikely; nothing here checks for them.
pub fn generate_random_value(data_type: ColumnDataType) -> Result<Value> {
    let mut rng = rand::thread_rng();
    match data_type {
        ColumnDataType::String => {
            let bytes: [u8; 16] = rng.r#gen();
            Ok(Value::String(hex::encode(bytes)))
        }
        ColumnDataType::Integer => Ok(Value::Int64(rng.gen_range(0..i64::MAX))),
        ColumnDataType::Float => {
            let n: i64 = rng.gen_range(0..1_000_000_000);
            Ok(Value::Float64(n as f64 / 1e9))
        }
        ColumnDataType::Boolean => Ok(Value::Bool(rng.r#gen::<u8>() % 2 == 0)),
        ColumnDataType::Date | ColumnDataType::Timestamp => {
            let now = Utc::now();
            let start = now
                .checked_sub_months(Months::new(RANDOM_WINDOW_MONTHS))
                .ok_or_else(|| DbseedError::Other("random timestamp window out of range".into()))?;
            let span = (now - start).num_seconds().max(1);
            let instant = start + chrono::Duration::seconds(rng.gen_range(0..span));
            if data_type == ColumnDataType::Date {
                Ok(Value::Date(instant.date_naive()))
            } else {
                Ok(Value::DateTimeUtc(instant))
            }
        }
        ColumnDataType::Unknown => Err(DbseedError::NotSupported(
            "cannot generate random value for unsupported data type UNKNOWN".into(),
        )),
    }
}

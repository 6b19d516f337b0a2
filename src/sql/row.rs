//! SQLite row -> JSON record, driven by each value's runtime storage class.

use crate::record::Record;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

pub fn row_to_record(row: &SqliteRow) -> Record {
    let mut map = Record::new();
    for (idx, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, idx));
    }
    map
}

fn cell_to_value(row: &SqliteRow, idx: usize) -> Value {
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    match storage.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(idx)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

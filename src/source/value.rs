// ABOUTME: Cell values and records read from the source table
// ABOUTME: Converts PostgreSQL rows into a small closed set of scalar variants

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio_postgres::Row;

use super::schema::{ColumnInfo, ScalarKind, TableSchema};

/// A single cell as mirrored into the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// String form used as the dedup key; `None` for null or blank values.
    pub fn key_text(&self) -> Option<String> {
        let text = match self {
            CellValue::Null => return None,
            CellValue::Bool(b) => b.to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => format_float(*f),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Timestamp(ts) => format_timestamp(ts),
        };

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// JSON value sent to the sheet API.
    ///
    /// Null becomes an empty string so appended rows keep their width.
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Null => JsonValue::String(String::new()),
            CellValue::Bool(b) => JsonValue::Bool(*b),
            // Sheets stores numbers as doubles; larger values would read back rounded
            CellValue::Integer(i) if i.unsigned_abs() > MAX_EXACT_SHEET_INTEGER => {
                JsonValue::String(i.to_string())
            }
            CellValue::Integer(i) => JsonValue::Number((*i).into()),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            CellValue::Text(s) => JsonValue::String(s.clone()),
            CellValue::Timestamp(ts) => JsonValue::String(format_timestamp(ts)),
        }
    }
}

/// Largest integer magnitude a sheet cell holds exactly (2^53).
pub const MAX_EXACT_SHEET_INTEGER: u64 = 1 << 53;

/// RFC 3339, UTC, millisecond precision: `2024-05-01T10:00:00.000Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Integral floats print without a fraction so `100.0` and `100` compare equal.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// One source row, positionally aligned with the run's [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<CellValue>,
}

impl Record {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.values.get(index)
    }

    pub fn get_named(&self, schema: &TableSchema, name: &str) -> Option<&CellValue> {
        schema.position(name).and_then(|idx| self.values.get(idx))
    }

    /// Dedup key at `index`, trimmed; `None` when missing or blank.
    pub fn key(&self, index: usize) -> Option<String> {
        self.values.get(index).and_then(CellValue::key_text)
    }

    pub fn into_values(self) -> Vec<CellValue> {
        self.values
    }
}

/// SELECT expression for a column.
///
/// Arrays and other composite values are serialized to JSON text in the
/// database so that they arrive as a single string cell.
pub fn select_expression(column: &ColumnInfo) -> String {
    let ident = crate::utils::quote_ident(&column.name);
    match column.kind {
        ScalarKind::Array => format!("to_jsonb({})::text AS {}", ident, ident),
        ScalarKind::Other => format!("{}::text AS {}", ident, ident),
        _ => ident,
    }
}

/// Convert a fetched row into a [`Record`].
pub fn row_to_record(row: &Row, schema: &TableSchema) -> Result<Record> {
    let values = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            read_cell(row, idx, column.kind)
                .with_context(|| format!("Failed to read column '{}'", column.name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Record::new(values))
}

fn read_cell(row: &Row, idx: usize, kind: ScalarKind) -> Result<CellValue> {
    let value = match kind {
        ScalarKind::Integer => {
            // information_schema does not tell us the width, so try each
            if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
                v.map(CellValue::Integer)
            } else if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
                v.map(|v| CellValue::Integer(v.into()))
            } else {
                row.try_get::<_, Option<i16>>(idx)?
                    .map(|v| CellValue::Integer(v.into()))
            }
        }
        ScalarKind::Float => {
            if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
                v.map(CellValue::Float)
            } else {
                row.try_get::<_, Option<f32>>(idx)?
                    .map(|v| CellValue::Float(v.into()))
            }
        }
        ScalarKind::Numeric => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map(|d| match d.to_f64() {
                Some(f) => CellValue::Float(f),
                None => CellValue::Text(d.to_string()),
            }),
        ScalarKind::Boolean => row.try_get::<_, Option<bool>>(idx)?.map(CellValue::Bool),
        ScalarKind::Timestamp => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|ts| CellValue::Timestamp(ts.and_utc())),
        ScalarKind::TimestampTz => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(CellValue::Timestamp),
        ScalarKind::Date => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| CellValue::Text(d.format("%Y-%m-%d").to_string())),
        ScalarKind::Uuid => row
            .try_get::<_, Option<uuid::Uuid>>(idx)?
            .map(|u| CellValue::Text(u.to_string())),
        ScalarKind::Json => row
            .try_get::<_, Option<JsonValue>>(idx)?
            .map(|j| CellValue::Text(j.to_string())),
        ScalarKind::Binary => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(|b| {
            CellValue::Text(base64::engine::general_purpose::STANDARD.encode(b))
        }),
        ScalarKind::Text | ScalarKind::Array | ScalarKind::Other => {
            row.try_get::<_, Option<String>>(idx)?.map(CellValue::Text)
        }
    };

    Ok(value.unwrap_or(CellValue::Null))
}

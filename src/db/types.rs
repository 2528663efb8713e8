//! Row-to-JSON normalization.
//!
//! Every engine reports rows in its own type system. A column's declared type
//! picks a [`TypeCategory`]; the category picks which Rust types to try when
//! decoding, and the first type the driver accepts produces the JSON value.
//! Values that cannot be decoded at all render as `null`.

use crate::models::{Backend, RowSet};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};
use tracing::trace;

/// Decode column `$idx` of `$row` as the first listed type the driver
/// accepts, converting with `$map` (default `JsonValue::from`). SQL `NULL`
/// becomes `JsonValue::Null`. Evaluates to `None` if no listed type fits.
macro_rules! decode_as {
    ($row:expr, $idx:expr, $map:expr => $($ty:ty),+ $(,)?) => {
        None$(.or_else(|| {
            $row.try_get::<Option<$ty>, _>($idx)
                .ok()
                .map(|value| value.map_or(JsonValue::Null, $map))
        }))+
    };
    ($row:expr, $idx:expr => $($ty:ty),+ $(,)?) => {
        decode_as!($row, $idx, JsonValue::from => $($ty),+)
    };
}

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a driver type name. Exact names are matched before substrings,
/// so `interval` and `point` do not read as integers.
pub fn categorize_type(type_name: &str, backend: Backend) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    let has = |needle: &str| lower.contains(needle);

    match lower.as_str() {
        // SQLite NUMERIC affinity stores floats
        "numeric" if backend == Backend::Sqlite => TypeCategory::Float,
        "interval" | "point" => TypeCategory::Unknown,
        "bool" | "boolean" => TypeCategory::Boolean,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "real" | "float4" | "float8" => TypeCategory::Float,
        "bytea" => TypeCategory::Binary,
        "date" | "time" | "timetz" => TypeCategory::Temporal,
        "name" => TypeCategory::Text,
        _ if has("decimal") || has("numeric") => TypeCategory::Decimal,
        _ if has("int") || has("serial") => TypeCategory::Integer,
        _ if has("float") || has("double") => TypeCategory::Float,
        _ if has("blob") || has("binary") => TypeCategory::Binary,
        _ if has("timestamp") || has("datetime") => TypeCategory::Temporal,
        _ if has("char") || has("text") => TypeCategory::Text,
        _ => TypeCategory::Unknown,
    }
}

/// Exact DECIMAL/NUMERIC text as the server sent it.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl From<RawDecimal> for JsonValue {
    fn from(value: RawDecimal) -> Self {
        JsonValue::String(value.0)
    }
}

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        categorize_type(ty.name(), Backend::MySql) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <&str as Decode<sqlx::MySql>>::decode(value).map(|s| RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        categorize_type(ty.name(), Backend::Postgres) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        // NUMERIC arrives in binary form; the text protocol gives the exact digits
        match value.format() {
            sqlx::postgres::PgValueFormat::Text => {
                <&str as Decode<sqlx::Postgres>>::decode(value).map(|s| RawDecimal(s.to_string()))
            }
            sqlx::postgres::PgValueFormat::Binary => Err("binary NUMERIC is not supported".into()),
        }
    }
}

/// Binary values render as text when they hold valid UTF-8, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn binary(bytes: Vec<u8>) -> JsonValue {
    decode_binary_value(&bytes)
}

fn rfc3339(ts: DateTime<Utc>) -> JsonValue {
    JsonValue::String(ts.to_rfc3339())
}

fn display<T: std::fmt::Display>(value: T) -> JsonValue {
    JsonValue::String(value.to_string())
}

/// Text columns whose declared type mentions JSON hold JSON documents.
fn text_or_json(type_name: &str) -> impl Fn(String) -> JsonValue + '_ {
    move |text| {
        if type_name.to_ascii_lowercase().contains("json") {
            if let Ok(doc) = serde_json::from_str(&text) {
                return doc;
            }
        }
        JsonValue::String(text)
    }
}

/// Conversion of a driver row into an ordered JSON record.
pub trait RowToJson: Row {
    const BACKEND: Backend;

    /// Decode one column. `None` means no supported Rust type accepted it.
    fn decode_value(&self, idx: usize, type_name: &str, category: TypeCategory)
    -> Option<JsonValue>;

    /// Column name to value, in column order. Keys are [`Self::column_names`],
    /// so a repeated name appears once per column.
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .zip(self.column_names())
            .enumerate()
            .map(|(idx, (col, key))| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, Self::BACKEND);
                let value = self
                    .decode_value(idx, type_name, category)
                    .unwrap_or_else(|| {
                        trace!(column = col.name(), type_name, "Undecodable value rendered as null");
                        JsonValue::Null
                    });
                (key, value)
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        unique_names(self.columns().iter().map(|c| c.name().to_string()))
    }
}

/// Make result column names usable as record keys. A repeated name gets a
/// `_2`, `_3`, ... suffix (`SELECT 1 AS a, 2 AS a` gives `a`, `a_2`).
pub fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .map(|name| {
            if seen.insert(name.clone()) {
                return name;
            }
            let mut n = 2;
            let renamed = loop {
                let candidate = format!("{name}_{n}");
                if !seen.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            seen.insert(renamed.clone());
            renamed
        })
        .collect()
}

impl RowToJson for MySqlRow {
    const BACKEND: Backend = Backend::MySql;

    fn decode_value(
        &self,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Option<JsonValue> {
        match category {
            TypeCategory::Decimal => decode_as!(self, idx => RawDecimal),
            TypeCategory::Integer => {
                decode_as!(self, idx => i64, i32, i16, i8, u64, u32, u16, u8)
            }
            TypeCategory::Boolean => decode_as!(self, idx => bool),
            TypeCategory::Float => decode_as!(self, idx => f64, f32),
            TypeCategory::Binary => decode_as!(self, idx, binary => Vec<u8>),
            TypeCategory::Json => decode_as!(self, idx => JsonValue),
            TypeCategory::Temporal => decode_as!(self, idx, rfc3339 => DateTime<Utc>)
                .or_else(|| decode_as!(self, idx, display => NaiveDateTime, NaiveDate, NaiveTime)),
            // Information schema and SHOW output may come back as VARBINARY
            _ => decode_as!(self, idx, text_or_json(type_name) => String)
                .or_else(|| decode_as!(self, idx, binary => Vec<u8>)),
        }
    }
}

impl RowToJson for PgRow {
    const BACKEND: Backend = Backend::Postgres;

    fn decode_value(
        &self,
        idx: usize,
        _type_name: &str,
        category: TypeCategory,
    ) -> Option<JsonValue> {
        match category {
            TypeCategory::Decimal => decode_as!(self, idx => RawDecimal),
            TypeCategory::Integer => decode_as!(self, idx => i64, i32, i16),
            TypeCategory::Boolean => decode_as!(self, idx => bool),
            TypeCategory::Float => decode_as!(self, idx => f64, f32),
            TypeCategory::Binary => decode_as!(self, idx, binary => Vec<u8>),
            TypeCategory::Json => decode_as!(self, idx => JsonValue),
            TypeCategory::Uuid => decode_as!(self, idx, display => uuid::Uuid),
            TypeCategory::Temporal => decode_as!(self, idx, rfc3339 => DateTime<Utc>)
                .or_else(|| decode_as!(self, idx, display => NaiveDateTime, NaiveDate, NaiveTime)),
            _ => decode_as!(self, idx => String),
        }
    }
}

impl RowToJson for SqliteRow {
    const BACKEND: Backend = Backend::Sqlite;

    /// Declared types are only affinities in SQLite, and expression columns
    /// (`SELECT 1`) report the value's storage class, so every category falls
    /// back to trying each storage class in turn.
    fn decode_value(
        &self,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Option<JsonValue> {
        let typed = match category {
            TypeCategory::Integer => decode_as!(self, idx => i64),
            TypeCategory::Boolean => decode_as!(self, idx => bool),
            TypeCategory::Float | TypeCategory::Decimal => decode_as!(self, idx => f64),
            TypeCategory::Binary => decode_as!(self, idx, binary => Vec<u8>),
            _ => None,
        };
        typed
            .or_else(|| decode_as!(self, idx, text_or_json(type_name) => String))
            .or_else(|| decode_as!(self, idx => i64, f64))
            .or_else(|| decode_as!(self, idx, binary => Vec<u8>))
    }
}

/// Build a row-set from driver rows.
///
/// Column names come from the first row; when there are no rows the caller
/// supplies them (usually from a prepared statement description).
pub fn rows_to_set<R: RowToJson>(rows: &[R], columns_if_empty: Vec<String>) -> RowSet {
    let columns = rows
        .first()
        .map(RowToJson::column_names)
        .unwrap_or_else(|| unique_names(columns_if_empty));
    RowSet::new(columns, rows.iter().map(RowToJson::to_json_map).collect())
}

// ABOUTME: Runtime description of the source table's columns
// ABOUTME: Column kinds are inferred from information_schema data types

/// Scalar kind inferred from a PostgreSQL `information_schema.columns.data_type`.
///
/// The kind decides how a column is selected and how its values are converted
/// into [`CellValue`](super::CellValue)s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    Integer,
    Float,
    Numeric,
    Boolean,
    Timestamp,
    TimestampTz,
    Date,
    Uuid,
    Json,
    Binary,
    Array,
    Other,
}

impl ScalarKind {
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "text" | "character varying" | "varchar" | "character" | "char" | "name"
            | "citext" => ScalarKind::Text,
            "smallint" | "integer" | "bigint" | "int2" | "int4" | "int8" => ScalarKind::Integer,
            "real" | "double precision" | "float4" | "float8" => ScalarKind::Float,
            "numeric" | "decimal" => ScalarKind::Numeric,
            "boolean" | "bool" => ScalarKind::Boolean,
            "timestamp without time zone" | "timestamp" => ScalarKind::Timestamp,
            "timestamp with time zone" | "timestamptz" => ScalarKind::TimestampTz,
            "date" => ScalarKind::Date,
            "uuid" => ScalarKind::Uuid,
            "json" | "jsonb" => ScalarKind::Json,
            "bytea" => ScalarKind::Binary,
            "ARRAY" => ScalarKind::Array,
            _ => ScalarKind::Other,
        }
    }

    /// Whether rows can be ordered most-recent-first by this column.
    pub fn is_timestamp(&self) -> bool {
        matches!(
            self,
            ScalarKind::Timestamp | ScalarKind::TimestampTz | ScalarKind::Date
        )
    }
}

/// One column of the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub kind: ScalarKind,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            kind: ScalarKind::from_data_type(&data_type),
            data_type,
        }
    }
}

/// Ordered column list discovered at the start of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSchema {
    columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Column names in ordinal order; this is the sheet header.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

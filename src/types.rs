use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values that can be bound to a query or read from a result row.
///
/// The same enum is used across all backends so callers never branch on
/// driver types:
/// ```rust
/// use sql_conduit::SqlValue;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
///
/// `List` only exists before preparation: the query preparer expands it into
/// one placeholder per element, and no driver ever receives one.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// A list of scalar values, expanded in-place for `IN (...)` queries.
    List(Vec<SqlValue>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness as used by conditional query blocks: `false`, zero,
    /// empty text/blob/list, `NULL`, and JSON `null`/`false` are falsy;
    /// everything else (timestamps included) is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            SqlValue::Bool(b) => *b,
            SqlValue::Int(i) => *i != 0,
            SqlValue::Float(f) => *f != 0.0,
            SqlValue::Text(s) => !s.is_empty(),
            SqlValue::Timestamp(_) => true,
            SqlValue::Null => false,
            SqlValue::Json(j) => !matches!(j, JsonValue::Null | JsonValue::Bool(false)),
            SqlValue::Blob(b) => !b.is_empty(),
            SqlValue::List(l) => !l.is_empty(),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(value) => Some(*value),
            SqlValue::Text(s) => {
                // Accept the two formats the drivers round-trip through text.
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

/// Serializes to the natural JSON shape (`Null` as `null`, `Timestamp` as
/// formatted text), not as a tagged enum.
impl serde::Serialize for SqlValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SqlValue::Int(i) => serializer.serialize_i64(*i),
            SqlValue::Float(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Timestamp(dt) => {
                serializer.collect_str(&dt.format("%Y-%m-%d %H:%M:%S%.f"))
            }
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Json(j) => j.serialize(serializer),
            SqlValue::Blob(b) => serializer.serialize_bytes(b),
            SqlValue::List(items) => serializer.collect_seq(items),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<Vec<i64>> for SqlValue {
    fn from(v: Vec<i64>) -> Self {
        SqlValue::List(v.into_iter().map(SqlValue::Int).collect())
    }
}

impl From<Vec<i32>> for SqlValue {
    fn from(v: Vec<i32>) -> Self {
        SqlValue::List(v.into_iter().map(|i| SqlValue::Int(i64::from(i))).collect())
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        SqlValue::List(v.into_iter().map(SqlValue::Text).collect())
    }
}

impl From<Vec<&str>> for SqlValue {
    fn from(v: Vec<&str>) -> Self {
        SqlValue::List(v.into_iter().map(|s| SqlValue::Text(s.to_owned())).collect())
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// The database engines supported by this crate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `SQLite` database
    Sqlite,
    /// `PostgreSQL` database
    Postgres,
    /// `MariaDB` database
    MariaDb,
}

impl DatabaseType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "SQLite",
            DatabaseType::Postgres => "PostgreSQL",
            DatabaseType::MariaDb => "MariaDB",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

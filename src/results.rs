use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SqlValue;

/// A single row from a query result.
///
/// Column names are shared across all rows of a result set; lookups by name
/// go through a prebuilt index.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<SqlValue>,
    index: Arc<HashMap<String, usize>>,
}

impl Row {
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get a value by column name, or `None` if the column doesn't exist.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.index.get(column).and_then(|&i| self.values.get(i))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// The result of a query: the column header plus zero or more rows.
///
/// The header is kept even when no rows came back.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn with_columns(columns: Vec<String>) -> ResultSetBuilder {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        ResultSetBuilder {
            columns: Arc::new(columns),
            index: Arc::new(index),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Serializes as a JSON object keyed by column name.
impl serde::Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.columns.iter().zip(&self.values))
    }
}

/// Serializes as a JSON array of row objects.
impl serde::Serialize for ResultSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(&self.rows)
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Incremental construction while draining a driver cursor.
pub struct ResultSetBuilder {
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    rows: Vec<Row>,
}

impl ResultSetBuilder {
    pub fn push(&mut self, values: Vec<SqlValue>) {
        self.rows.push(Row {
            columns: Arc::clone(&self.columns),
            values,
            index: Arc::clone(&self.index),
        });
    }

    #[must_use]
    pub fn finish(self) -> ResultSet {
        ResultSet {
            columns: self.columns,
            rows: self.rows,
        }
    }
}

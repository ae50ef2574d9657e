//! Row mapping traits and utilities

use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value, decode_column};
use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter};

/// One result row: column labels mapped to values, in result order.
///
/// Labels are taken from the result metadata, so `AS` aliases are honoured
/// and case is preserved exactly as the server reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, appending it if the label is new.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.columns.insert(label.into(), value.into());
        self
    }

    /// Value of a column by label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.columns.get(label)
    }

    /// Label and value of a column by position.
    pub fn get_index(&self, idx: usize) -> Option<(&str, &Value)> {
        self.columns
            .get_index(idx)
            .map(|(label, value)| (label.as_str(), value))
    }

    /// Value of the first column.
    pub fn first(&self) -> Option<&Value> {
        self.columns.first().map(|(_, value)| value)
    }

    /// Extract a column as `T`, failing if it is missing or has another type.
    pub fn get_as<T: FromValue>(&self, label: &str) -> DbResult<T> {
        let value = self
            .get(label)
            .ok_or_else(|| DbError::mapping(label, "no such column"))?;
        T::from_value(value).map_err(|e| DbError::mapping(label, e.to_string()))
    }

    /// Extract a column as `T`, using `T::default()` when the column is absent.
    ///
    /// This is the lookup `#[derive(FromRow)]` generates for every field.
    pub fn field<T: FromValue + Default>(&self, label: &str) -> DbResult<T> {
        match self.get(label) {
            Some(value) => {
                T::from_value(value).map_err(|e| DbError::mapping(label, e.to_string()))
            }
            None => Ok(T::default()),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.columns.contains_key(label)
    }

    /// Column labels, in result order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_map(self) -> IndexMap<String, Value> {
        self.columns
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Map a driver row into a [`Row`], preserving column order and labels.
pub fn map_row(row: &tokio_postgres::Row) -> DbResult<Row> {
    let mut out = IndexMap::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx).map_err(|e| DbError::mapping(column.name(), e))?;
        out.insert(column.name().to_string(), value);
    }
    Ok(Row { columns: out })
}

/// Trait for converting a [`Row`] into a Rust struct.
///
/// This trait should typically be derived using `#[derive(FromRow)]`, which
/// matches each named field to the column with the same label.
///
/// # Example
///
/// ```ignore
/// use simpledb::FromRow;
///
/// #[derive(Debug, Default, FromRow)]
/// #[orm(rename_all = "camelCase")]
/// struct Article {
///     id: i64,
///     title: String,
///     created_date: chrono::NaiveDateTime,
///     is_blind: bool,
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a row into Self
    fn from_row(row: &Row) -> DbResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.clone())
    }
}

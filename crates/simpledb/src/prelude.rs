//! Convenient imports for typical `simpledb` usage.
//!
//! ```ignore
//! use simpledb::prelude::*;
//! ```

pub use crate::{DbConfig, DbError, DbResult, FromRow, Row, SimpleDb, Sql, Value, params};

//! # simpledb
//!
//! A small SQL-first access layer for PostgreSQL.
//!
//! ## Features
//!
//! - **SQL explicit**: statements are written by hand, fragment by fragment
//! - **One connection per context**: a [`SimpleDb`] opens its connection lazily
//!   and closes it on [`SimpleDb::close`] or drop
//! - **`?` placeholders**: compiled to `$1..$n` at execution time
//! - **Typed results**: Row → Struct via the [`FromRow`] trait (derivable)
//! - **Tracing**: every statement is reported through `tracing`
//!
//! ## Example
//!
//! ```ignore
//! use simpledb::{FromRow, SimpleDb};
//!
//! #[derive(Debug, Default, FromRow)]
//! struct Article {
//!     id: i64,
//!     title: String,
//! }
//!
//! let mut db = SimpleDb::new("localhost", "app", "secret", "blog");
//!
//! let mut sql = db.gen_sql().await?;
//! sql.append("SELECT id, title FROM article", ())
//!     .append("WHERE is_blind = ?", (false,));
//! sql.append_in("AND id IN (?)", [1, 2, 3])?;
//! let articles: Vec<Article> = sql.select_rows_as().await?;
//!
//! db.close().await;
//! ```

pub mod builder;
pub mod config;
pub mod db;
pub mod error;
pub mod params;
pub mod prelude;
pub mod row;
pub mod sql;
pub mod trace;
pub mod value;

pub use builder::SqlBuilder;
pub use config::{DATABASE_URL_ENV, DEFAULT_PORT, DbConfig};
pub use db::SimpleDb;
pub use error::{DbError, DbResult};
pub use params::IntoParams;
pub use row::{FromRow, Row, map_row};
pub use sql::Sql;
pub use trace::{QueryKind, SqlTrace};
pub use value::{FromValue, TypeMismatch, Value};

// Re-export the driver so callers can name its types without a second dependency
pub use tokio_postgres;

#[cfg(feature = "derive")]
pub use simpledb_derive::FromRow;

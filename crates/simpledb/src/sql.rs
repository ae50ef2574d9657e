//! Statement execution.
//!
//! A [`Sql`] pairs a [`SqlBuilder`] with a borrowed connection. Build the
//! statement with [`append`](Sql::append) / [`append_in`](Sql::append_in),
//! then call one terminal operation:
//!
//! ```ignore
//! let mut sql = db.gen_sql().await?;
//! sql.append("SELECT * FROM article", ())
//!     .append("WHERE is_blind = ?", (false,))
//!     .append("ORDER BY id DESC", ());
//! let rows = sql.select_rows().await?;
//! ```
//!
//! Terminal operations take `&self`: calling one twice runs the same
//! statement again and never changes [`text`](Sql::text) or
//! [`params`](Sql::params).

use crate::builder::{SqlBuilder, contains_keyword, trim_statement_end};
use crate::error::{DbError, DbResult};
use crate::params::IntoParams;
use crate::row::{FromRow, Row, map_row};
use crate::trace::{QueryKind, SqlTrace};
use crate::value::{Value, decode_column};
use chrono::NaiveDateTime;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Column};

/// Which of the given (table oid, attribute number) pairs are identity
/// columns or default to `nextval()`.
const GENERATED_COLUMNS_SQL: &str = "SELECT a.attrelid, a.attnum
FROM pg_attribute a
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE (a.attrelid, a.attnum) IN (SELECT * FROM unnest($1::oid[], $2::int2[]))
  AND (a.attidentity IN ('a', 'd') OR pg_get_expr(d.adbin, d.adrelid) LIKE 'nextval(%')";

/// A statement under construction, bound to one connection.
#[must_use]
pub struct Sql<'c> {
    client: &'c Client,
    builder: SqlBuilder,
    trace: SqlTrace,
}

impl<'c> Sql<'c> {
    /// Start an empty statement on `client`.
    pub fn new(client: &'c Client) -> Self {
        Self::with_trace(client, SqlTrace::default())
    }

    pub(crate) fn with_trace(client: &'c Client, trace: SqlTrace) -> Self {
        Self {
            client,
            builder: SqlBuilder::new(),
            trace,
        }
    }

    /// Append a fragment and its parameters. See [`SqlBuilder::append`].
    pub fn append(&mut self, fragment: &str, params: impl IntoParams) -> &mut Self {
        self.builder.append(fragment, params);
        self
    }

    /// Append an IN-list fragment. See [`SqlBuilder::append_in`].
    pub fn append_in(&mut self, fragment: &str, params: impl IntoParams) -> DbResult<&mut Self> {
        self.builder.append_in(fragment, params)?;
        Ok(self)
    }

    /// The accumulated SQL, with `?` placeholders.
    pub fn text(&self) -> &str {
        self.builder.text()
    }

    /// The accumulated parameters.
    pub fn params(&self) -> &[Value] {
        self.builder.params()
    }

    pub fn builder(&self) -> &SqlBuilder {
        &self.builder
    }

    fn bind_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.builder
            .params()
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }

    // The prepared statement lives only inside these two helpers, so it is
    // closed on every exit path. The connection is left open.

    async fn query_prepared(&self, sql: &str) -> DbResult<Vec<tokio_postgres::Row>> {
        let statement = self.client.prepare(sql).await?;
        let params = self.bind_params();
        Ok(self.client.query(&statement, &params).await?)
    }

    async fn execute_prepared(&self, sql: &str) -> DbResult<u64> {
        let statement = self.client.prepare(sql).await?;
        let params = self.bind_params();
        Ok(self.client.execute(&statement, &params).await?)
    }

    async fn query_raw(&self, kind: QueryKind, sql: &str) -> DbResult<Vec<tokio_postgres::Row>> {
        let started = self.trace.before(kind, sql, self.builder.params());
        let result = self.query_prepared(sql).await;
        self.trace
            .after(kind, started, result.as_ref().map(|rows| rows.len() as u64));
        result
    }

    pub(crate) async fn execute(&self, kind: QueryKind) -> DbResult<u64> {
        let sql = self.builder.to_positional();
        let started = self.trace.before(kind, &sql, self.builder.params());
        let result = self.execute_prepared(&sql).await;
        self.trace.after(kind, started, result.as_ref().copied());
        result
    }

    // ==================== Writes ====================

    /// Execute an INSERT and return the generated key.
    ///
    /// Unless the statement already has a `RETURNING` clause, `RETURNING *` is
    /// appended. The key is the first returned column backed by an identity
    /// or `nextval()`-defaulted table column. Returns `0` when nothing comes
    /// back, no such column is returned, or its value is not an integer.
    pub async fn insert(&self) -> DbResult<i64> {
        let mut sql = self.builder.to_positional();
        if !contains_keyword(&sql, "RETURNING") {
            sql = format!("{} RETURNING *", trim_statement_end(&sql));
        }

        let rows = self.query_raw(QueryKind::Insert, &sql).await?;
        let Some(row) = rows.first() else {
            return Ok(0);
        };
        let Some(idx) = self.generated_key_index(row.columns()).await? else {
            return Ok(0);
        };
        match decode_column(row, idx) {
            Ok(Value::Int(key)) => Ok(key),
            _ => Ok(0),
        }
    }

    /// Position of the first column that comes from a generated table column.
    async fn generated_key_index(&self, columns: &[Column]) -> DbResult<Option<usize>> {
        let sources: Vec<(usize, u32, i16)> = columns
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| Some((idx, c.table_oid()?, c.column_id()?)))
            .collect();
        if sources.is_empty() {
            return Ok(None);
        }

        let oids: Vec<u32> = sources.iter().map(|&(_, oid, _)| oid).collect();
        let attnums: Vec<i16> = sources.iter().map(|&(_, _, attnum)| attnum).collect();
        let generated = self
            .client
            .query(GENERATED_COLUMNS_SQL, &[&oids, &attnums])
            .await?
            .iter()
            .map(|row| Ok((row.try_get::<_, u32>(0)?, row.try_get::<_, i16>(1)?)))
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        Ok(sources
            .iter()
            .find(|&&(_, oid, attnum)| generated.contains(&(oid, attnum)))
            .map(|&(idx, _, _)| idx))
    }

    /// Execute the statement and return the number of affected rows.
    pub async fn update(&self) -> DbResult<u64> {
        self.execute(QueryKind::Update).await
    }

    /// Same as [`update`](Sql::update).
    pub async fn delete(&self) -> DbResult<u64> {
        self.execute(QueryKind::Delete).await
    }

    // ==================== Untyped reads ====================

    /// Execute the query and return every row.
    pub async fn select_rows(&self) -> DbResult<Vec<Row>> {
        let sql = self.builder.to_positional();
        let rows = self.query_raw(QueryKind::Select, &sql).await?;
        rows.iter().map(map_row).collect()
    }

    /// Execute the query and return the first row, if any.
    pub async fn select_row(&self) -> DbResult<Option<Row>> {
        Ok(self.select_rows().await?.into_iter().next())
    }

    async fn select_first_value(&self) -> DbResult<Option<Value>> {
        Ok(self
            .select_row()
            .await?
            .and_then(|row| row.into_iter().next())
            .map(|(_, value)| value))
    }

    /// First column of the first row as an integer.
    pub async fn select_long(&self) -> DbResult<Option<i64>> {
        Ok(self.select_first_value().await?.and_then(|v| v.as_i64()))
    }

    /// First column of the first row rendered as a string.
    pub async fn select_string(&self) -> DbResult<Option<String>> {
        Ok(self.select_first_value().await?.and_then(|v| v.as_string()))
    }

    /// First column of the first row as a boolean.
    pub async fn select_boolean(&self) -> DbResult<Option<bool>> {
        Ok(self.select_first_value().await?.and_then(|v| v.as_bool()))
    }

    /// First column of the first row, if it is a timestamp.
    pub async fn select_datetime(&self) -> DbResult<Option<NaiveDateTime>> {
        Ok(self.select_first_value().await?.and_then(|v| v.as_datetime()))
    }

    /// First column of every row as an integer, in row order.
    pub async fn select_longs(&self) -> DbResult<Vec<Option<i64>>> {
        let sql = self.builder.to_positional();
        let rows = self.query_raw(QueryKind::Select, &sql).await?;
        rows.iter()
            .map(|row| {
                if row.is_empty() {
                    return Ok(None);
                }
                let value = decode_column(row, 0)
                    .map_err(|e| DbError::mapping(row.columns()[0].name(), e))?;
                Ok(value.as_i64())
            })
            .collect()
    }

    // ==================== Typed reads ====================

    /// Execute the query and map every row to `T`.
    ///
    /// A row that fails to map aborts the whole call.
    pub async fn select_rows_as<T: FromRow>(&self) -> DbResult<Vec<T>> {
        self.select_rows_with(T::from_row).await
    }

    /// Execute the query and map the first row to `T`, if any.
    pub async fn select_row_as<T: FromRow>(&self) -> DbResult<Option<T>> {
        self.select_row_with(T::from_row).await
    }

    /// Execute the query and map every row with `f`.
    pub async fn select_rows_with<T, F>(&self, f: F) -> DbResult<Vec<T>>
    where
        F: FnMut(&Row) -> DbResult<T>,
    {
        self.select_rows().await?.iter().map(f).collect()
    }

    /// Execute the query and map the first row with `f`, if any.
    pub async fn select_row_with<T, F>(&self, f: F) -> DbResult<Option<T>>
    where
        F: FnOnce(&Row) -> DbResult<T>,
    {
        self.select_row().await?.as_ref().map(f).transpose()
    }
}

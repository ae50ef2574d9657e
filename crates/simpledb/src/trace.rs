//! `tracing` events around statement execution.

use crate::error::DbError;
use crate::value::Value;
use std::time::Instant;

/// Truncate to at most `max_bytes`, respecting char boundaries.
fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// The kind of terminal operation being traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Row-returning query
    Select,
    /// INSERT with generated-key retrieval
    Insert,
    /// UPDATE (or any statement run for its affected-row count)
    Update,
    /// DELETE
    Delete,
    /// One-shot statement on an independent connection
    Run,
}

/// Emits one event before and one after every statement.
///
/// Events use target `simpledb.sql`. In dev mode the statement is logged at
/// INFO together with its parameters; otherwise at DEBUG without them.
#[derive(Debug, Clone)]
pub struct SqlTrace {
    dev_mode: bool,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    max_sql_length: Option<usize>,
}

impl Default for SqlTrace {
    fn default() -> Self {
        Self {
            dev_mode: false,
            max_sql_length: Some(200),
        }
    }
}

impl SqlTrace {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            dev_mode,
            ..Self::default()
        }
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    fn truncate_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    pub(crate) fn before(&self, kind: QueryKind, sql: &str, params: &[Value]) -> Instant {
        let sql = self.truncate_sql(sql);
        if self.dev_mode {
            tracing::info!(
                target: "simpledb.sql",
                kind = ?kind,
                param_count = params.len(),
                params = ?params,
                sql = %sql,
                "executing statement"
            );
        } else {
            tracing::debug!(
                target: "simpledb.sql",
                kind = ?kind,
                param_count = params.len(),
                sql = %sql,
                "executing statement"
            );
        }
        Instant::now()
    }

    pub(crate) fn after(&self, kind: QueryKind, started: Instant, outcome: Result<u64, &DbError>) {
        let elapsed = started.elapsed();
        match outcome {
            Ok(rows) => tracing::debug!(
                target: "simpledb.sql",
                kind = ?kind,
                rows,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "statement finished"
            ),
            Err(err) => tracing::warn!(
                target: "simpledb.sql",
                kind = ?kind,
                error = %err,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "statement failed"
            ),
        }
    }
}

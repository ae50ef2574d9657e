//! Per-context connection ownership.

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::params::IntoParams;
use crate::sql::Sql;
use crate::trace::{QueryKind, SqlTrace};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

/// An open connection and the task driving its socket.
struct Connection {
    client: Client,
    task: JoinHandle<()>,
}

impl Connection {
    /// Drop the client and wait for the I/O task to wind down.
    async fn close(self) {
        let Connection { client, task } = self;
        drop(client);
        if let Err(e) = task.await {
            tracing::warn!(target: "simpledb.conn", error = %e, "connection task did not finish cleanly");
        }
    }
}

async fn open(config: &DbConfig) -> DbResult<Connection> {
    let (client, connection) = config
        .pg_config()
        .connect(NoTls)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    let task = tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(target: "simpledb.conn", error = %e, "connection error");
        }
    });

    tracing::debug!(
        target: "simpledb.conn",
        host = config.host().unwrap_or_default(),
        port = config.get_port(),
        dbname = config.dbname().unwrap_or_default(),
        "connection opened"
    );
    Ok(Connection { client, task })
}

/// One logical execution context and the single connection it owns.
///
/// The connection is opened on first use, reused by every statement made
/// through [`gen_sql`](SimpleDb::gen_sql), and released by
/// [`close`](SimpleDb::close) or when the `SimpleDb` is dropped. Give each
/// concurrent task its own `SimpleDb`.
///
/// # Example
///
/// ```ignore
/// let mut db = SimpleDb::new("localhost", "app", "secret", "blog");
/// let mut sql = db.gen_sql().await?;
/// sql.append("SELECT count(*) FROM article", ());
/// let total = sql.select_long().await?;
/// db.close().await;
/// ```
pub struct SimpleDb {
    config: DbConfig,
    dev_mode: bool,
    conn: Option<Connection>,
}

impl SimpleDb {
    /// Target `host` on port 5432. No connection is opened yet.
    pub fn new(host: &str, user: &str, password: &str, db_name: &str) -> Self {
        Self::with_config(DbConfig::new(host, user, password, db_name))
    }

    pub fn with_config(config: DbConfig) -> Self {
        Self {
            config,
            dev_mode: false,
            conn: None,
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Log statements at INFO with their parameters.
    pub fn set_dev_mode(&mut self, dev_mode: bool) {
        self.dev_mode = dev_mode;
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Whether a usable cached connection exists.
    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.client.is_closed())
    }

    /// The cached connection, opened (or reopened, if it was closed) on demand.
    pub async fn connection(&mut self) -> DbResult<&Client> {
        let conn = match self.conn.take() {
            Some(conn) if !conn.client.is_closed() => conn,
            stale => {
                if let Some(stale) = stale {
                    tracing::debug!(target: "simpledb.conn", "cached connection is closed, reopening");
                    stale.close().await;
                }
                open(&self.config).await?
            }
        };
        Ok(&self.conn.insert(conn).client)
    }

    /// Start a statement on this context's connection.
    pub async fn gen_sql(&mut self) -> DbResult<Sql<'_>> {
        let trace = SqlTrace::new(self.dev_mode);
        let client = self.connection().await?;
        Ok(Sql::with_trace(client, trace))
    }

    /// Execute one statement on a fresh connection and close it again.
    ///
    /// The cached connection is not used, so the statement does not see
    /// session state (temporary tables, open transactions) of this context.
    pub async fn run(&self, sql: &str, params: impl IntoParams) -> DbResult<u64> {
        let conn = open(&self.config).await?;
        let result = {
            let mut stmt = Sql::with_trace(&conn.client, SqlTrace::new(self.dev_mode));
            stmt.append(sql, params);
            stmt.execute(QueryKind::Run).await
        };
        conn.close().await;
        tracing::debug!(target: "simpledb.conn", "one-shot connection closed");
        result
    }

    /// Close the cached connection. Calling this again is a no-op.
    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close().await;
            tracing::debug!(target: "simpledb.conn", "connection closed");
        }
    }
}

impl std::fmt::Debug for SimpleDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleDb")
            .field("config", &self.config)
            .field("dev_mode", &self.dev_mode)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_opens_nothing() {
        let db = SimpleDb::new("localhost", "app", "secret", "blog");
        assert!(!db.is_connected());
        assert!(!db.dev_mode());
        assert_eq!(db.config().get_port(), 5432);
    }

    #[tokio::test]
    async fn close_without_connection_is_noop() {
        let mut db = SimpleDb::new("localhost", "app", "secret", "blog");
        db.close().await;
        db.close().await;
        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_error() {
        let config = DbConfig::new("127.0.0.1", "app", "secret", "blog")
            .port(1)
            .connect_timeout(std::time::Duration::from_secs(2));
        let mut db = SimpleDb::with_config(config);
        let err = db.gen_sql().await.err().unwrap();
        assert!(matches!(err, DbError::Connection(_)));
        assert!(!db.is_connected());
    }
}

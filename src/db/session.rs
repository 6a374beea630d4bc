use std::time::Duration;

use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use tracing::debug;

use crate::config::Config;
use crate::db::descriptor::{ConnectionDescriptor, SslMode};
use crate::service::classifier::DbFailure;

/// One short-lived connection: opened for a single request, closed afterwards.
pub struct Session {
    conn: PgConnection,
    target: String,
}

impl Session {
    /// Connect, giving up after `timeout`.
    pub async fn open_with_timeout(
        desc: &ConnectionDescriptor,
        fallback_ssl: SslMode,
        timeout: Duration,
    ) -> Result<Self, DbFailure> {
        let opts = desc.connect_options(fallback_ssl);
        let target = desc.target();
        debug!(server = %target, timeout_ms = timeout.as_millis() as u64, "opening connection");

        match tokio::time::timeout(timeout, PgConnection::connect_with(&opts)).await {
            Ok(Ok(conn)) => Ok(Self { conn, target }),
            Ok(Err(e)) => Err(DbFailure::from_sqlx(&e)),
            Err(_) => Err(DbFailure::connect_timeout(timeout)),
        }
    }

    /// Connect using the descriptor's own `connection_timeout`.
    pub async fn open(desc: &ConnectionDescriptor, fallback_ssl: SslMode) -> Result<Self, DbFailure> {
        Self::open_with_timeout(desc, fallback_ssl, desc.connect_timeout()).await
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Terminate gracefully. A failed goodbye only matters to the logs.
    pub async fn close(self) {
        let target = self.target;
        if let Err(e) = self.conn.close().await {
            debug!(server = %target, error = %e, "connection close failed");
        }
    }
}

/// The persistent server's pool. Lazy, so startup never waits on the database.
pub fn shared_pool(cfg: &Config) -> PgPool {
    let desc = cfg.pool_descriptor();
    let opts = desc
        .connect_options(cfg.db_ssl_mode)
        .options([("statement_timeout", cfg.db_query_timeout.to_string())]);

    PgPoolOptions::new()
        .max_connections(cfg.db_max_connections.max(1))
        .acquire_timeout(Duration::from_millis(cfg.db_connection_timeout.max(1)))
        .idle_timeout(Duration::from_secs(30))
        .connect_lazy_with(opts)
}

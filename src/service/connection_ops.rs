//! Operations on a transient connection: open, run one thing, close.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::db::descriptor::{ConnectionDescriptor, SslMode};
use crate::db::introspection::{self, ColumnInfo, ServerClock, ServerIdentity, TableInfo};
use crate::db::query::{self, QueryOutput};
use crate::db::schema::{APP_SCHEMA, APP_TABLES};
use crate::db::session::Session;
use crate::service::classifier::DbFailure;
use crate::types::requests::query_chars;

/// SSL mode of the per-request endpoints when the descriptor names none.
pub const FUNCTION_SSL_DEFAULT: SslMode = SslMode::Prefer;
/// Connect timeout of the proxy server's `test-connection`.
pub const PROXY_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a connectivity probe plus the time it took, success or not.
#[derive(Debug)]
pub struct Probe<T> {
    pub elapsed: Duration,
    pub outcome: Result<T, DbFailure>,
}

impl<T> Probe<T> {
    pub fn latency_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Connect and ask the server who it is.
pub async fn test_connection(desc: &ConnectionDescriptor) -> Probe<ServerIdentity> {
    let started = Instant::now();
    let outcome = async {
        let mut session = Session::open(desc, FUNCTION_SSL_DEFAULT).await?;
        let identity = introspection::server_identity(session.conn()).await;
        session.close().await;
        identity.map_err(|e| DbFailure::from_sqlx(&e))
    }
    .await;

    let probe = Probe {
        elapsed: started.elapsed(),
        outcome,
    };
    if probe.outcome.is_ok() {
        info!(server = %desc.target(), latency_ms = probe.latency_ms(), "connection test successful");
    }
    probe
}

/// The proxy server's variant: fixed timeout, `require` SSL by default, server clock.
pub async fn probe_server_clock(desc: &ConnectionDescriptor) -> Probe<ServerClock> {
    let started = Instant::now();
    let outcome = async {
        let mut session =
            Session::open_with_timeout(desc, SslMode::Require, PROXY_TEST_TIMEOUT).await?;
        let clock = introspection::server_clock(session.conn()).await;
        session.close().await;
        clock.map_err(|e| DbFailure::from_sqlx(&e))
    }
    .await;

    Probe {
        elapsed: started.elapsed(),
        outcome,
    }
}

pub async fn list_tables(desc: &ConnectionDescriptor) -> Result<Vec<TableInfo>, DbFailure> {
    let mut session = Session::open(desc, FUNCTION_SSL_DEFAULT).await?;
    let tables = introspection::list_tables(session.conn()).await;
    session.close().await;
    let tables = tables.map_err(|e| DbFailure::from_sqlx(&e))?;
    debug!(server = %desc.target(), count = tables.len(), "listed tables");
    Ok(tables)
}

pub async fn table_schema(
    desc: &ConnectionDescriptor,
    table_name: &str,
) -> Result<Vec<ColumnInfo>, DbFailure> {
    let mut session = Session::open(desc, FUNCTION_SSL_DEFAULT).await?;
    let columns = introspection::table_columns(session.conn(), table_name, false).await;
    session.close().await;
    columns.map_err(|e| DbFailure::from_sqlx(&e))
}

/// Run one caller-supplied statement (or parameterless batch).
pub async fn execute(
    desc: &ConnectionDescriptor,
    sql: &str,
    params: &[Value],
) -> Result<QueryOutput, DbFailure> {
    info!(
        server = %desc.target(),
        query_length = query_chars(sql),
        param_count = params.len(),
        "executing query"
    );
    let mut session = Session::open(desc, FUNCTION_SSL_DEFAULT).await?;
    let output = query::run(session.conn(), sql, params).await;
    session.close().await;
    output.map_err(|e| DbFailure::from_sqlx(&e))
}

/// Create the dashboard's own tables on the target database.
pub async fn init_app_schema(desc: &ConnectionDescriptor) -> Result<QueryOutput, DbFailure> {
    let output = execute(desc, APP_SCHEMA, &[]).await?;
    info!(server = %desc.target(), tables = ?APP_TABLES, "app schema initialized");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::classifier::FailureKind;

    fn unreachable_descriptor(port: u16) -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "127.0.0.1".into(),
            port,
            database: "postgres".into(),
            username: "postgres".into(),
            password: "postgres".into(),
            ssl_mode: Some(SslMode::Disable),
            connection_timeout: Some(5),
        }
    }

    #[tokio::test]
    async fn refused_port_is_reported_with_latency() {
        // Port 1 is privileged and never has a PostgreSQL listener in CI.
        let probe = test_connection(&unreachable_descriptor(1)).await;
        let failure = probe.outcome.expect_err("nothing listens on port 1");
        assert!(matches!(
            failure.kind,
            FailureKind::ConnectionRefused | FailureKind::Timeout
        ));
        assert!(probe.elapsed <= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn failed_connect_short_circuits_queries() {
        let err = execute(&unreachable_descriptor(1), "SELECT 1", &[])
            .await
            .expect_err("nothing listens on port 1");
        assert_ne!(err.kind, FailureKind::Unclassified, "{err:?}");
    }
}

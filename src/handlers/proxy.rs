//! `/api/*` endpoints of the persistent proxy server.

use std::time::Instant;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::db::introspection::{self, TableInfo};
use crate::db::query;
use crate::error::ProxyError;
use crate::middleware::auth::RequireApiKey;
use crate::middleware::client_ip::ClientIp;
use crate::router::ProxyState;
use crate::service::classifier::{ConnectionWording, DbFailure, FailureWording, QueryWording};
use crate::service::connection_ops;
use crate::types::envelope::{
    DataEnvelope, QueryData, TableSchemaData, TestConnectionReport, millis_label,
};
use crate::types::requests::{query_chars, validate_query, validate_test_connection};

/// `POST /api/test-connection`
pub async fn test_connection(
    State(state): State<ProxyState>,
    _auth: RequireApiKey,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TestConnectionReport>, ProxyError> {
    let Json(body) = body?;
    let desc = validate_test_connection(&body).map_err(ProxyError::Validation)?;

    let probe = connection_ops::probe_server_clock(&desc).await;
    let latency = probe.latency_ms();
    match probe.outcome {
        Ok(server_info) => {
            info!(
                host = %desc.host,
                database = %desc.database,
                user = %desc.username,
                latency_ms = latency,
                "connection test successful"
            );
            Ok(Json(TestConnectionReport {
                success: true,
                message: "Connection successful",
                latency: millis_label(latency),
                server_info,
            }))
        }
        Err(failure) => {
            warn!(
                host = %desc.host,
                database = %desc.database,
                code = ?failure.code(),
                error = %failure.message,
                "connection test failed"
            );
            Err(classified(&state, &ConnectionWording, &failure, None))
        }
    }
}

/// `POST /api/query`
pub async fn execute_query(
    State(state): State<ProxyState>,
    _auth: RequireApiKey,
    ClientIp(ip): ClientIp,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DataEnvelope<QueryData>>, ProxyError> {
    let Json(body) = body?;
    let req = validate_query(&body).map_err(ProxyError::Validation)?;

    info!(
        query_length = query_chars(&req.query),
        param_count = req.params.len(),
        ip = %ip,
        "executing query"
    );

    let started = Instant::now();
    let outcome = match state.pool.acquire().await {
        Ok(mut conn) => query::run(&mut conn, &req.query, &req.params).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(output) => {
            let execution_time = millis_label(started.elapsed().as_millis() as u64);
            info!(row_count = output.row_count, execution_time = %execution_time, "query executed");
            Ok(DataEnvelope::ok(QueryData {
                rows: output.rows,
                row_count: output.row_count,
                fields: output.fields,
                execution_time,
            }))
        }
        Err(e) => {
            let failure = DbFailure::from_sqlx(&e);
            let execution_time = millis_label(started.elapsed().as_millis() as u64);
            error!(
                code = ?failure.code(),
                error = %failure.message,
                execution_time = %execution_time,
                "query execution failed"
            );
            Err(classified(&state, &QueryWording, &failure, Some(execution_time)))
        }
    }
}

/// `GET /api/tables`
pub async fn list_tables(
    State(state): State<ProxyState>,
    _auth: RequireApiKey,
) -> Result<Json<DataEnvelope<Vec<TableInfo>>>, ProxyError> {
    let tables = introspection::list_tables(&state.pool).await.map_err(|e| {
        error!(error = %e, "failed to fetch tables");
        ProxyError::Database {
            context: "Failed to fetch tables",
            details: state.details(&e.to_string()),
        }
    })?;
    Ok(DataEnvelope::ok(tables))
}

/// `GET /api/tables/{table_name}/schema`
pub async fn table_schema(
    State(state): State<ProxyState>,
    _auth: RequireApiKey,
    Path(table_name): Path<String>,
) -> Result<Json<DataEnvelope<TableSchemaData>>, ProxyError> {
    let columns = introspection::table_columns(&state.pool, &table_name, true)
        .await
        .map_err(|e| {
            error!(table = %table_name, error = %e, "failed to fetch table schema");
            ProxyError::Database {
                context: "Failed to fetch table schema",
                details: state.details(&e.to_string()),
            }
        })?;

    if columns.is_empty() {
        return Err(ProxyError::NotFound("Table not found"));
    }
    Ok(DataEnvelope::ok(TableSchemaData {
        table_name,
        columns,
    }))
}

fn classified(
    state: &ProxyState,
    wording: &dyn FailureWording,
    failure: &DbFailure,
    execution_time: Option<String>,
) -> ProxyError {
    ProxyError::Classified {
        message: wording.describe(failure),
        code: failure.code(),
        execution_time,
        details: state.details(&failure.message),
    }
}

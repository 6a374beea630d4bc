use axum::{http::StatusCode, response::Response};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::db::descriptor::ConnectionDescriptor;
use crate::middleware::function_request::DbAction;
use crate::service::classifier::{DbFailure, FailureWording, FunctionWording};
use crate::service::connection_ops;
use crate::types::envelope::FunctionEnvelope;
use crate::types::requests::{QueryConfig, SchemaConfig};

/// `POST /db-connection`: one action against a caller-described database.
pub async fn db_connection_handler(action: DbAction) -> Response {
    match action {
        DbAction::TestConnection(desc) => test_connection(desc).await,
        DbAction::GetTables(desc) => get_tables(desc).await,
        DbAction::GetTableSchema(cfg) => get_table_schema(cfg).await,
        DbAction::ExecuteQuery(cfg) => execute_query(cfg).await,
    }
}

async fn test_connection(desc: ConnectionDescriptor) -> Response {
    let probe = connection_ops::test_connection(&desc).await;
    let latency = probe.latency_ms();
    match probe.outcome {
        Ok(identity) => FunctionEnvelope {
            success: true,
            message: Some("Connection successful".into()),
            latency: Some(latency),
            details: Some(json!({
                "version": identity.version,
                "database": identity.database,
                "connected_at": Utc::now().to_rfc3339(),
            })),
            ..FunctionEnvelope::default()
        }
        .respond(StatusCode::OK),
        Err(failure) => {
            warn!(server = %desc.target(), code = ?failure.code(), latency_ms = latency, "connection test failed");
            FunctionEnvelope {
                latency: Some(latency),
                details: Some(json!({
                    "error_type": failure.error_type,
                    "attempted_at": Utc::now().to_rfc3339(),
                })),
                ..failed(&failure)
            }
            .respond(StatusCode::BAD_REQUEST)
        }
    }
}

async fn get_tables(desc: ConnectionDescriptor) -> Response {
    match connection_ops::list_tables(&desc).await {
        Ok(tables) => FunctionEnvelope {
            success: true,
            tables: Some(tables),
            ..FunctionEnvelope::default()
        }
        .respond(StatusCode::OK),
        Err(failure) => {
            error!(server = %desc.target(), error = %failure.message, "get_tables failed");
            failed(&failure).respond(StatusCode::BAD_REQUEST)
        }
    }
}

async fn get_table_schema(cfg: SchemaConfig) -> Response {
    match connection_ops::table_schema(&cfg.connection, &cfg.table_name).await {
        Ok(columns) => FunctionEnvelope {
            success: true,
            schema: Some(columns),
            ..FunctionEnvelope::default()
        }
        .respond(StatusCode::OK),
        Err(failure) => {
            error!(table = %cfg.table_name, error = %failure.message, "get_table_schema failed");
            failed(&failure).respond(StatusCode::BAD_REQUEST)
        }
    }
}

async fn execute_query(cfg: QueryConfig) -> Response {
    match connection_ops::execute(&cfg.connection, &cfg.query, &cfg.params).await {
        Ok(output) => FunctionEnvelope {
            success: true,
            execution_time: Some(output.elapsed_ms()),
            row_count: Some(output.row_count),
            data: Some(output.rows),
            query: Some(cfg.query),
            ..FunctionEnvelope::default()
        }
        .respond(StatusCode::OK),
        Err(failure) => {
            error!(code = ?failure.code(), error = %failure.message, "execute_query failed");
            FunctionEnvelope {
                query: Some(cfg.query),
                ..failed(&failure)
            }
            .respond(StatusCode::BAD_REQUEST)
        }
    }
}

fn failed(failure: &DbFailure) -> FunctionEnvelope {
    FunctionEnvelope::failure(FunctionWording.describe(failure))
}

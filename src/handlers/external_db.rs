use axum::{http::StatusCode, response::Response};
use tracing::error;

use crate::middleware::function_request::ExternalJson;
use crate::service::classifier::{DbFailure, FailureWording, FunctionWording};
use crate::service::connection_ops;
use crate::types::envelope::FunctionEnvelope;
use crate::types::requests::{ExternalQueryRequest, InitSchemaRequest};

/// `POST /external-db`
pub async fn external_query_handler(
    ExternalJson(req): ExternalJson<ExternalQueryRequest>,
) -> Response {
    match connection_ops::execute(&req.connection, &req.query, &req.params).await {
        Ok(output) => FunctionEnvelope {
            success: true,
            row_count: Some(output.row_count),
            rows_affected: Some(output.row_count),
            data: Some(output.rows),
            message: Some("Query executed successfully".into()),
            ..FunctionEnvelope::default()
        }
        .respond(StatusCode::OK),
        Err(failure) => {
            error!(server = %req.connection.target(), error = %failure.message, "external query failed");
            failed(&failure)
        }
    }
}

/// `POST /external-db/init-schema`
pub async fn init_schema_handler(ExternalJson(req): ExternalJson<InitSchemaRequest>) -> Response {
    match connection_ops::init_app_schema(&req.connection).await {
        Ok(_) => FunctionEnvelope {
            success: true,
            message: Some("Schema initialized".into()),
            ..FunctionEnvelope::default()
        }
        .respond(StatusCode::OK),
        Err(failure) => {
            error!(server = %req.connection.target(), error = %failure.message, "schema init failed");
            failed(&failure)
        }
    }
}

fn failed(failure: &DbFailure) -> Response {
    FunctionEnvelope {
        error: Some(FunctionWording.describe(failure)),
        ..FunctionEnvelope::default()
    }
    .respond(StatusCode::BAD_REQUEST)
}

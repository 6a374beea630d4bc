//! JSON response envelopes. Field names are the dashboard's wire contract.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

use crate::db::introspection::{ColumnInfo, ServerClock, TableInfo};
use crate::db::rows::FieldInfo;

/// Envelope of the per-request connection endpoints (`/db-connection`, `/external-db`).
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<ColumnInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl FunctionEnvelope {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn respond(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// `{ success: true, data }`, used by most proxy-server endpoints.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataEnvelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TestConnectionReport {
    pub success: bool,
    pub message: &'static str,
    /// `"<n>ms"`
    pub latency: String,
    pub server_info: ServerClock,
}

#[derive(Debug, Serialize)]
pub struct QueryData {
    pub rows: Vec<Value>,
    #[serde(rename = "rowCount")]
    pub row_count: u64,
    pub fields: Vec<FieldInfo>,
    /// `"<n>ms"`
    #[serde(rename = "executionTime")]
    pub execution_time: String,
}

#[derive(Debug, Serialize)]
pub struct TableSchemaData {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub success: bool,
    pub status: &'static str,
    pub timestamp: String,
    pub database: DatabaseStatus,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub connected: bool,
    pub server_time: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpInfo {
    pub ip: String,
    pub timestamp: String,
    pub user_agent: String,
    pub country: String,
    pub headers: ForwardingHeaders,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ForwardingHeaders {
    pub x_forwarded_for: Option<String>,
    pub x_real_ip: Option<String>,
    pub cf_connecting_ip: Option<String>,
    pub cf_ipcountry: String,
}

/// `"<n>ms"`, the proxy server's duration format.
pub fn millis_label(ms: u64) -> String {
    format!("{ms}ms")
}

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error as ThisError;

/// Errors of the API-key protected proxy server, rendered as
/// `{ success: false, error, code?, executionTime?, details? }`.
#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("Validation error")]
    Validation(Vec<String>),

    #[error("Unauthorized: Invalid or missing API key")]
    Unauthorized,

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    NotFound(&'static str),

    /// A driver failure mapped to a user-facing message (HTTP 400).
    #[error("{message}")]
    Classified {
        message: String,
        code: Option<String>,
        execution_time: Option<String>,
        details: Option<String>,
    },

    /// A driver failure on a fixed introspection query (HTTP 500).
    #[error("{context}")]
    Database {
        context: &'static str,
        details: Option<String>,
    },
}

/// Unparseable bodies are reported like a failed field check.
impl From<JsonRejection> for ProxyError {
    fn from(rejection: JsonRejection) -> Self {
        ProxyError::Validation(vec![rejection.body_text()])
    }
}

/// Standardized proxy error body.
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "executionTime", skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: None,
            execution_time: None,
            details: None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ProxyError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    details: Some(json!(details)),
                    ..ApiErrorBody::new(message)
                },
            ),
            ProxyError::Unauthorized => (StatusCode::UNAUTHORIZED, ApiErrorBody::new(message)),
            ProxyError::RateLimited { retry_after_secs } => {
                let mut resp = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": message, "retryAfter": retry_after_secs })),
                )
                    .into_response();
                resp.headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
                return resp;
            }
            ProxyError::NotFound(_) => (StatusCode::NOT_FOUND, ApiErrorBody::new(message)),
            ProxyError::Classified {
                code,
                execution_time,
                details,
                ..
            } => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code,
                    execution_time,
                    details: details.map(Value::String),
                    ..ApiErrorBody::new(message)
                },
            ),
            ProxyError::Database { details, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody {
                    details: details.map(Value::String),
                    ..ApiErrorBody::new(message)
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

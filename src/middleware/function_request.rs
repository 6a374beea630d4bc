use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::db::descriptor::ConnectionDescriptor;
use crate::types::envelope::FunctionEnvelope;
use crate::types::requests::{QueryConfig, SchemaConfig};

/// A parsed `POST /db-connection` body.
#[derive(Debug, Clone)]
pub enum DbAction {
    TestConnection(ConnectionDescriptor),
    GetTables(ConnectionDescriptor),
    GetTableSchema(SchemaConfig),
    ExecuteQuery(QueryConfig),
}

#[derive(Deserialize)]
struct ActionBody {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    config: Value,
}

impl DbAction {
    /// `Ok(None)` for an action name this endpoint does not know.
    pub fn parse(body: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        let ActionBody { action, config } = serde_json::from_slice(body)?;
        let parsed = match action.as_deref() {
            Some("test_connection") => Self::TestConnection(serde_json::from_value(config)?),
            Some("get_tables") => Self::GetTables(serde_json::from_value(config)?),
            Some("get_table_schema") => Self::GetTableSchema(serde_json::from_value(config)?),
            Some("execute_query") => Self::ExecuteQuery(serde_json::from_value(config)?),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

impl<S> FromRequest<S> for DbAction
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            FunctionEnvelope::failure(rejection.body_text()).respond(rejection.status())
        })?;

        match DbAction::parse(&body) {
            Ok(Some(action)) => Ok(action),
            Ok(None) => Err(FunctionEnvelope::failure("Invalid action").respond(StatusCode::BAD_REQUEST)),
            Err(e) => Err(
                FunctionEnvelope::failure(e.to_string()).respond(StatusCode::INTERNAL_SERVER_ERROR),
            ),
        }
    }
}

/// JSON body of the `/external-db` endpoints. Failures use the `error` key.
pub struct ExternalJson<T>(pub T);

impl<S, T> FromRequest<S> for ExternalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| external_failure(rejection.status(), rejection.body_text()))?;

        serde_json::from_slice(&body)
            .map(ExternalJson)
            .map_err(|e| external_failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

fn external_failure(status: StatusCode, error: String) -> Response {
    FunctionEnvelope {
        error: Some(error),
        ..FunctionEnvelope::default()
    }
    .respond(status)
}

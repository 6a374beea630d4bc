//! Request bodies and their validation.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::db::descriptor::{ConnectionDescriptor, DEFAULT_PORT, SslMode};

/// Longest SQL text the proxy server accepts.
pub const MAX_QUERY_LEN: usize = 10_000;

/// `config` of the `get_table_schema` action.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    #[serde(flatten)]
    pub connection: ConnectionDescriptor,
    #[serde(rename = "tableName")]
    pub table_name: String,
}

/// `config` of the `execute_query` action.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(flatten)]
    pub connection: ConnectionDescriptor,
    pub query: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Body of `POST /external-db`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalQueryRequest {
    pub connection: ConnectionDescriptor,
    pub query: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Body of `POST /external-db/init-schema`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitSchemaRequest {
    pub connection: ConnectionDescriptor,
}

/// Validated body of `POST /api/query`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyQuery {
    pub query: String,
    pub params: Vec<Value>,
}

/// Field-level checks in the style `"field" <problem>`; all problems are reported.
struct Checker<'a> {
    body: Option<&'a Map<String, Value>>,
    errors: Vec<String>,
}

impl<'a> Checker<'a> {
    fn new(body: &'a Value) -> Self {
        let mut errors = Vec::new();
        let body = body.as_object();
        if body.is_none() {
            errors.push("\"value\" must be of type object".to_string());
        }
        Self { body, errors }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.body?.get(field).filter(|v| !v.is_null())
    }

    fn required_str(&mut self, field: &str) -> String {
        match self.get(field) {
            None if self.body.is_some() => {
                self.errors.push(format!("\"{field}\" is required"));
                String::new()
            }
            None => String::new(),
            Some(Value::String(s)) if s.is_empty() => {
                self.errors
                    .push(format!("\"{field}\" is not allowed to be empty"));
                String::new()
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.errors.push(format!("\"{field}\" must be a string"));
                String::new()
            }
        }
    }

    fn port(&mut self, field: &str) -> u16 {
        let Some(raw) = self.get(field) else {
            return DEFAULT_PORT;
        };
        let number = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            None => {
                self.errors.push(format!("\"{field}\" must be a number"));
                DEFAULT_PORT
            }
            Some(n) if n.fract() != 0.0 => {
                self.errors.push(format!("\"{field}\" must be an integer"));
                DEFAULT_PORT
            }
            Some(n) if n < 1.0 => {
                self.errors
                    .push(format!("\"{field}\" must be greater than or equal to 1"));
                DEFAULT_PORT
            }
            Some(n) if n > 65535.0 => {
                self.errors
                    .push(format!("\"{field}\" must be less than or equal to 65535"));
                DEFAULT_PORT
            }
            Some(n) => n as u16,
        }
    }

    fn ssl_mode(&mut self, field: &str, default: SslMode) -> SslMode {
        let Some(raw) = self.get(field) else {
            return default;
        };
        match raw.as_str().map(str::parse::<SslMode>) {
            Some(Ok(mode)) => mode,
            _ => {
                let allowed: Vec<&str> = SslMode::ALL.iter().map(|m| m.as_str()).collect();
                self.errors.push(format!(
                    "\"{field}\" must be one of [{}]",
                    allowed.join(", ")
                ));
                default
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<String>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

/// Body of `POST /api/test-connection`: `{ host, port?, database, user, password, ssl_mode? }`.
pub fn validate_test_connection(body: &Value) -> Result<ConnectionDescriptor, Vec<String>> {
    let mut check = Checker::new(body);
    let host = check.required_str("host");
    let port = check.port("port");
    let database = check.required_str("database");
    let username = check.required_str("user");
    let password = check.required_str("password");
    let ssl_mode = check.ssl_mode("ssl_mode", SslMode::Require);

    check.finish(ConnectionDescriptor {
        host,
        port,
        database,
        username,
        password,
        ssl_mode: Some(ssl_mode),
        connection_timeout: None,
    })
}

/// Length of a statement as the validator counts it: characters, not bytes.
pub fn query_chars(sql: &str) -> usize {
    sql.chars().count()
}

/// Body of `POST /api/query`: `{ query, params? }`.
pub fn validate_query(body: &Value) -> Result<ProxyQuery, Vec<String>> {
    let mut check = Checker::new(body);
    let query = check.required_str("query");
    if query_chars(&query) > MAX_QUERY_LEN {
        check.errors.push(format!(
            "\"query\" length must be less than or equal to {MAX_QUERY_LEN} characters long"
        ));
    }
    let params = match check.get("params") {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            check.errors.push("\"params\" must be an array".to_string());
            Vec::new()
        }
    };
    check.finish(ProxyQuery { query, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_applies_defaults() {
        let desc = validate_test_connection(&json!({
            "host": "db", "database": "app", "user": "u", "password": "p"
        }))
        .unwrap();
        assert_eq!(desc.port, 5432);
        assert_eq!(desc.ssl_mode, Some(SslMode::Require));
        assert_eq!(desc.username, "u");
    }

    #[test]
    fn test_connection_reports_every_problem() {
        let errors = validate_test_connection(&json!({
            "host": "", "port": 70000, "user": 7, "password": "p", "ssl_mode": "strict"
        }))
        .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "\"host\" is not allowed to be empty".to_string(),
                "\"port\" must be less than or equal to 65535".to_string(),
                "\"database\" is required".to_string(),
                "\"user\" must be a string".to_string(),
                "\"ssl_mode\" must be one of [disable, allow, prefer, require, verify-ca, verify-full]"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn port_accepts_numeric_strings() {
        let desc = validate_test_connection(&json!({
            "host": "db", "port": "6432", "database": "app", "user": "u", "password": "p"
        }))
        .unwrap();
        assert_eq!(desc.port, 6432);
    }

    #[test]
    fn query_length_is_capped() {
        let long = "x".repeat(MAX_QUERY_LEN + 1);
        let errors = validate_query(&json!({ "query": long })).unwrap_err();
        assert_eq!(
            errors,
            vec!["\"query\" length must be less than or equal to 10000 characters long"]
        );
    }

    #[test]
    fn multibyte_queries_are_measured_in_characters() {
        let sql = "SELECT 'é'".to_string() + &"ü".repeat(MAX_QUERY_LEN - 10);
        assert_eq!(query_chars(&sql), MAX_QUERY_LEN);
        assert!(sql.len() > MAX_QUERY_LEN);
        assert!(validate_query(&json!({ "query": sql })).is_ok());
    }

    #[test]
    fn query_params_default_to_empty() {
        let q = validate_query(&json!({ "query": "SELECT 1" })).unwrap();
        assert!(q.params.is_empty());
        assert!(validate_query(&json!({ "query": "SELECT $1", "params": {"a": 1} })).is_err());
        assert!(validate_query(&json!([1, 2])).is_err());
    }

    #[test]
    fn action_configs_flatten_the_descriptor() {
        let cfg: QueryConfig = serde_json::from_value(json!({
            "host": "h", "database": "d", "username": "u", "password": "p",
            "query": "SELECT $1::int AS n", "params": [5]
        }))
        .unwrap();
        assert_eq!(cfg.connection.port, 5432);
        assert_eq!(cfg.params, vec![json!(5)]);

        let schema: SchemaConfig = serde_json::from_value(json!({
            "host": "h", "port": 6543, "database": "d", "username": "u", "password": "p",
            "tableName": "orders"
        }))
        .unwrap();
        assert_eq!(schema.table_name, "orders");
        assert_eq!(schema.connection.port, 6543);
    }
}

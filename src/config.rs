use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::db::descriptor::{ConnectionDescriptor, SslMode};

/// Environment keys read by [`Config::from_env`].
const ENV_KEYS: &[&str] = &[
    "bind_addr",
    "port",
    "log_level",
    "api_key",
    "db_host",
    "db_port",
    "db_name",
    "db_user",
    "db_password",
    "db_ssl_mode",
    "db_connection_timeout",
    "db_query_timeout",
    "db_max_connections",
    "rate_limit_window_ms",
    "rate_limit_max_requests",
    "expose_error_details",
    "body_limit_bytes",
];

/// Keys taken as the literal string from the environment. figment's `Env`
/// parses values, which would turn a password like `007` into the number 7.
const VERBATIM_KEYS: &[&str] = &[
    "bind_addr",
    "log_level",
    "api_key",
    "db_host",
    "db_name",
    "db_user",
    "db_password",
];

/// Runtime configuration, flat so each field maps to one environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub log_level: String,
    /// Key required on `/api/*`. Empty rejects every request.
    pub api_key: String,

    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_ssl_mode: SslMode,
    /// Milliseconds.
    pub db_connection_timeout: u64,
    /// Milliseconds; applied as `statement_timeout` on pooled connections.
    pub db_query_timeout: u64,
    pub db_max_connections: u32,

    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,

    /// Echo raw driver messages in `details` of proxy error envelopes.
    pub expose_error_details: bool,
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3001,
            log_level: "info".to_string(),
            api_key: String::new(),
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_name: "postgres".to_string(),
            db_user: "postgres".to_string(),
            db_password: String::new(),
            db_ssl_mode: SslMode::Require,
            db_connection_timeout: 30_000,
            db_query_timeout: 60_000,
            db_max_connections: 20,
            rate_limit_window_ms: 15 * 60 * 1000,
            rate_limit_max_requests: 100,
            expose_error_details: false,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        let verbatim: BTreeMap<String, String> = Env::raw()
            .only(VERBATIM_KEYS)
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect();
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(ENV_KEYS).ignore(VERBATIM_KEYS))
            .merge(Serialized::defaults(verbatim))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_addr, self.port).parse()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms.max(1))
    }

    /// Descriptor for the proxy server's shared pool.
    pub fn pool_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            username: self.db_user.clone(),
            password: self.db_password.clone(),
            ssl_mode: Some(self.db_ssl_mode),
            connection_timeout: Some(self.db_connection_timeout.div_ceil(1000)),
        }
    }
}

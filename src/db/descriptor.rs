use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

pub const DEFAULT_PORT: u16 = 5432;
/// Seconds, used when a descriptor carries no `connection_timeout`.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub const ALL: [SslMode; 6] = [
        SslMode::Disable,
        SslMode::Allow,
        SslMode::Prefer,
        SslMode::Require,
        SslMode::VerifyCa,
        SslMode::VerifyFull,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SslMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown ssl_mode `{s}`"))
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Identifies one target PostgreSQL instance, as sent by the dashboard.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    #[serde(alias = "user")]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub ssl_mode: Option<SslMode>,
    /// Seconds.
    #[serde(default)]
    pub connection_timeout: Option<u64>,
}

impl ConnectionDescriptor {
    /// Driver options; `fallback_ssl` applies when the descriptor names no mode.
    pub fn connect_options(&self, fallback_ssl: SslMode) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(self.ssl_mode.unwrap_or(fallback_ssl).into())
            .application_name("datallm-proxy")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connection_timeout
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// `user@host:port/database`, safe for logs.
    pub fn target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssl_mode", &self.ssl_mode)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_user_alias_and_defaults_port() {
        let desc: ConnectionDescriptor = serde_json::from_value(json!({
            "host": "db.internal",
            "database": "analytics",
            "user": "reader",
            "password": "pw",
        }))
        .unwrap();
        assert_eq!(desc.username, "reader");
        assert_eq!(desc.port, DEFAULT_PORT);
        assert_eq!(desc.ssl_mode, None);
        assert_eq!(desc.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn parses_kebab_case_ssl_modes() {
        let desc: ConnectionDescriptor = serde_json::from_value(json!({
            "host": "h", "port": 6543, "database": "d",
            "username": "u", "password": "p",
            "ssl_mode": "verify-ca", "connection_timeout": 5,
        }))
        .unwrap();
        assert_eq!(desc.ssl_mode, Some(SslMode::VerifyCa));
        assert_eq!(desc.connect_timeout(), Duration::from_secs(5));
        assert_eq!("verify-full".parse::<SslMode>(), Ok(SslMode::VerifyFull));
        assert!("strict".parse::<SslMode>().is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let desc = ConnectionDescriptor {
            host: "h".into(),
            port: 5432,
            database: "d".into(),
            username: "u".into(),
            password: "hunter2".into(),
            ssl_mode: None,
            connection_timeout: None,
        };
        let rendered = format!("{desc:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(desc.target(), "u@h:5432/d");
    }
}

//! Maps raw driver errors onto a fixed set of user-facing categories.

use std::io::ErrorKind;
use std::time::Duration;

/// Category of a database failure, derived from SQLSTATE, I/O kind or message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionRefused,
    HostNotFound,
    AuthenticationFailed,
    DatabaseNotFound,
    Timeout,
    Ssl,
    TableNotFound,
    ColumnNotFound,
    UniqueViolation,
    ForeignKeyViolation,
    Unclassified,
}

impl FailureKind {
    /// Errno-style code reported for transport failures without a SQLSTATE.
    fn transport_code(self) -> Option<&'static str> {
        match self {
            FailureKind::ConnectionRefused => Some("ECONNREFUSED"),
            FailureKind::HostNotFound => Some("ENOTFOUND"),
            FailureKind::Timeout => Some("ETIMEDOUT"),
            _ => None,
        }
    }
}

/// A classified driver failure.
#[derive(Debug, Clone)]
pub struct DbFailure {
    pub kind: FailureKind,
    /// SQLSTATE when the server reported one.
    pub sqlstate: Option<String>,
    /// Raw driver message.
    pub message: String,
    pub error_type: &'static str,
}

impl DbFailure {
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let sqlstate = db.code().map(|c| c.into_owned());
                let message = db.message().to_string();
                Self {
                    kind: classify(sqlstate.as_deref(), &message),
                    sqlstate,
                    message,
                    error_type: "DatabaseError",
                }
            }
            sqlx::Error::Io(io) => {
                let message = err.to_string();
                let kind = match io.kind() {
                    ErrorKind::ConnectionRefused => FailureKind::ConnectionRefused,
                    ErrorKind::TimedOut => FailureKind::Timeout,
                    _ => classify(None, &message),
                };
                Self {
                    kind,
                    sqlstate: None,
                    message,
                    error_type: "ConnectionError",
                }
            }
            sqlx::Error::Tls(_) => Self {
                kind: FailureKind::Ssl,
                sqlstate: None,
                message: err.to_string(),
                error_type: "TlsError",
            },
            sqlx::Error::PoolTimedOut => Self {
                kind: FailureKind::Timeout,
                sqlstate: None,
                message: err.to_string(),
                error_type: "PoolTimedOut",
            },
            other => {
                let message = other.to_string();
                Self {
                    kind: classify(None, &message),
                    sqlstate: None,
                    message,
                    error_type: "DriverError",
                }
            }
        }
    }

    /// The connect attempt did not finish within the descriptor's timeout.
    pub fn connect_timeout(after: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            sqlstate: None,
            message: format!("Connection timeout after {}ms", after.as_millis()),
            error_type: "TimeoutError",
        }
    }

    /// SQLSTATE, or an errno-style name for transport failures.
    pub fn code(&self) -> Option<String> {
        self.sqlstate
            .clone()
            .or_else(|| self.kind.transport_code().map(str::to_string))
    }
}

/// Code first, then message substrings.
pub fn classify(sqlstate: Option<&str>, message: &str) -> FailureKind {
    if let Some(kind) = sqlstate.and_then(classify_sqlstate) {
        return kind;
    }

    let lower = message.to_ascii_lowercase();
    if message.contains("ECONNREFUSED") || lower.contains("connection refused") {
        FailureKind::ConnectionRefused
    } else if message.contains("ENOTFOUND")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("nodename nor servname")
        || lower.contains("no such host")
        || lower.contains("temporary failure in name resolution")
    {
        FailureKind::HostNotFound
    } else if lower.contains("authentication failed") {
        FailureKind::AuthenticationFailed
    } else if lower.contains("database") && lower.contains("does not exist") {
        FailureKind::DatabaseNotFound
    } else if lower.contains("timeout") || lower.contains("timed out") {
        FailureKind::Timeout
    } else if message.contains("SSL") || message.contains("TLS") {
        FailureKind::Ssl
    } else {
        FailureKind::Unclassified
    }
}

fn classify_sqlstate(code: &str) -> Option<FailureKind> {
    let kind = match code {
        "28P01" | "28000" => FailureKind::AuthenticationFailed,
        "3D000" => FailureKind::DatabaseNotFound,
        "42P01" => FailureKind::TableNotFound,
        "42703" => FailureKind::ColumnNotFound,
        "23505" => FailureKind::UniqueViolation,
        "23503" => FailureKind::ForeignKeyViolation,
        "57014" => FailureKind::Timeout,
        _ => return None,
    };
    Some(kind)
}

/// Turns a classified failure into the message one endpoint family reports.
pub trait FailureWording: Send + Sync {
    fn describe(&self, failure: &DbFailure) -> String;
}

/// Wording of the per-request connection endpoints (`/db-connection`, `/external-db`).
pub struct FunctionWording;

impl FailureWording for FunctionWording {
    fn describe(&self, failure: &DbFailure) -> String {
        let fixed = match failure.kind {
            FailureKind::ConnectionRefused => {
                "Connection refused. Please check if the database server is running and accessible."
            }
            FailureKind::HostNotFound => {
                "Host not found. Please check the hostname or IP address."
            }
            FailureKind::AuthenticationFailed => {
                "Authentication failed. Please check your username and password."
            }
            FailureKind::DatabaseNotFound => {
                "Database does not exist. Please check the database name."
            }
            FailureKind::Timeout => "Connection timeout. The database server may be slow to respond.",
            FailureKind::Ssl => "SSL connection error. Please check your SSL configuration.",
            _ if failure.message.trim().is_empty() => "Unknown database connection error",
            _ => return failure.message.clone(),
        };
        fixed.to_string()
    }
}

/// Wording of the proxy server's `test-connection` endpoint.
pub struct ConnectionWording;

impl FailureWording for ConnectionWording {
    fn describe(&self, failure: &DbFailure) -> String {
        match failure.kind {
            FailureKind::HostNotFound => "Host not found. Please check the hostname.",
            FailureKind::ConnectionRefused => {
                "Connection refused. Please check if the server is running and the port is correct."
            }
            FailureKind::AuthenticationFailed => {
                "Authentication failed. Please check your username and password."
            }
            FailureKind::DatabaseNotFound => "Database does not exist.",
            FailureKind::Timeout => {
                "Connection timeout. Please check your network connection and firewall settings."
            }
            _ => "Connection failed",
        }
        .to_string()
    }
}

/// Wording of the proxy server's `query` endpoint.
pub struct QueryWording;

impl FailureWording for QueryWording {
    fn describe(&self, failure: &DbFailure) -> String {
        match failure.kind {
            FailureKind::TableNotFound => "Table does not exist",
            FailureKind::ColumnNotFound => "Column does not exist",
            FailureKind::UniqueViolation => "Duplicate key value violates unique constraint",
            FailureKind::ForeignKeyViolation => "Foreign key constraint violation",
            _ => "Query execution failed",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn failure(kind: FailureKind, message: &str) -> DbFailure {
        DbFailure {
            kind,
            sqlstate: None,
            message: message.to_string(),
            error_type: "DatabaseError",
        }
    }

    #[test]
    fn sqlstate_wins_over_message() {
        assert_eq!(
            classify(Some("42P01"), "relation \"database_x\" does not exist"),
            FailureKind::TableNotFound
        );
        assert_eq!(
            classify(Some("28P01"), "password authentication failed for user \"bob\""),
            FailureKind::AuthenticationFailed
        );
        assert_eq!(
            classify(Some("3D000"), "database \"nope\" does not exist"),
            FailureKind::DatabaseNotFound
        );
    }

    #[test]
    fn message_patterns_without_code() {
        assert_eq!(
            classify(None, "error communicating with database: failed to lookup address information: Name or service not known"),
            FailureKind::HostNotFound
        );
        assert_eq!(
            classify(None, "connect ECONNREFUSED 127.0.0.1:5432"),
            FailureKind::ConnectionRefused
        );
        assert_eq!(
            classify(None, "error occurred while attempting to establish a TLS connection"),
            FailureKind::Ssl
        );
        assert_eq!(classify(None, "syntax error at or near \"SELEC\""), FailureKind::Unclassified);
    }

    #[test]
    fn io_errors_use_their_kind() {
        let refused = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        let f = DbFailure::from_sqlx(&refused);
        assert_eq!(f.kind, FailureKind::ConnectionRefused);
        assert_eq!(f.code().as_deref(), Some("ECONNREFUSED"));

        let timed_out = sqlx::Error::PoolTimedOut;
        let f = DbFailure::from_sqlx(&timed_out);
        assert_eq!(f.kind, FailureKind::Timeout);
        assert_eq!(f.code().as_deref(), Some("ETIMEDOUT"));
    }

    #[test]
    fn each_family_words_the_same_failure_differently() {
        let f = failure(FailureKind::HostNotFound, "lookup failed");
        assert_eq!(
            FunctionWording.describe(&f),
            "Host not found. Please check the hostname or IP address."
        );
        assert_eq!(
            ConnectionWording.describe(&f),
            "Host not found. Please check the hostname."
        );
        assert_eq!(QueryWording.describe(&f), "Query execution failed");
    }

    #[test]
    fn function_wording_falls_back_to_raw_message() {
        let f = failure(FailureKind::UniqueViolation, "duplicate key value");
        assert_eq!(FunctionWording.describe(&f), "duplicate key value");
        assert_eq!(
            QueryWording.describe(&f),
            "Duplicate key value violates unique constraint"
        );
        let empty = failure(FailureKind::Unclassified, "  ");
        assert_eq!(
            FunctionWording.describe(&empty),
            "Unknown database connection error"
        );
        assert_eq!(ConnectionWording.describe(&empty), "Connection failed");
    }

    #[test]
    fn connect_timeout_reports_etimedout() {
        let f = DbFailure::connect_timeout(Duration::from_secs(10));
        assert_eq!(f.kind, FailureKind::Timeout);
        assert_eq!(f.code().as_deref(), Some("ETIMEDOUT"));
        assert!(f.message.contains("10000ms"));
    }
}

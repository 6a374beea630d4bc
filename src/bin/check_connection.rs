//! Connectivity check against the `DB_*` settings of the proxy server.

use std::process::ExitCode;
use std::time::Instant;

use datallm_proxy::Config;
use datallm_proxy::db::{Session, introspection};
use datallm_proxy::service::classifier::{DbFailure, FailureKind};

fn suggestion(kind: FailureKind) -> Option<&'static str> {
    match kind {
        FailureKind::HostNotFound => Some("Check if the hostname is correct"),
        FailureKind::ConnectionRefused => Some("Check if the server is running and port is correct"),
        FailureKind::AuthenticationFailed => Some("Check username and password"),
        FailureKind::DatabaseNotFound => Some("Check if the database exists"),
        FailureKind::Timeout => Some("Check network connectivity and firewall settings"),
        _ => None,
    }
}

async fn run(cfg: &Config) -> Result<(), DbFailure> {
    let desc = cfg.pool_descriptor();
    let started = Instant::now();
    let mut session =
        Session::open_with_timeout(&desc, cfg.db_ssl_mode, desc.connect_timeout()).await?;
    println!("Connection successful! ({}ms)", started.elapsed().as_millis());

    let probe = async {
        let clock = introspection::server_clock(session.conn()).await?;
        println!("Server Time: {}", clock.server_time.to_rfc3339());
        println!("Version: {}", clock.version);
        let tables = introspection::count_user_tables(session.conn()).await?;
        println!("User Tables: {tables}");
        Ok::<_, sqlx::Error>(())
    }
    .await;
    session.close().await;
    probe.map_err(|e| DbFailure::from_sqlx(&e))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Testing PostgreSQL connection...");
    println!("Host: {}", cfg.db_host);
    println!("Port: {}", cfg.db_port);
    println!("Database: {}", cfg.db_name);
    println!("User: {}", cfg.db_user);
    println!("SSL Mode: {}", cfg.db_ssl_mode.as_str());

    match run(&cfg).await {
        Ok(()) => {
            println!("Connection test completed successfully!");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("Connection failed: {}", failure.message);
            eprintln!(
                "Error Code: {}",
                failure.code().as_deref().unwrap_or("unknown")
            );
            if let Some(hint) = suggestion(failure.kind) {
                eprintln!("Suggestion: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_side_failures_have_no_suggestion() {
        assert!(suggestion(FailureKind::TableNotFound).is_none());
        assert_eq!(
            suggestion(FailureKind::AuthenticationFailed),
            Some("Check username and password")
        );
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use datallm_proxy::{Config, ProxyState, db, middleware::rate_limit, proxy_router};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Arc::new(Config::from_env()?);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        db_host = %cfg.db_host,
        db_port = cfg.db_port,
        db_name = %cfg.db_name,
        db_ssl_mode = cfg.db_ssl_mode.as_str(),
        max_connections = cfg.db_max_connections,
        loglevel = %cfg.log_level
    );
    if cfg.api_key.is_empty() {
        warn!("API_KEY is not set; every /api request will be rejected");
    }

    let pool = db::shared_pool(&cfg);
    let state = ProxyState::new(cfg.clone(), pool.clone());
    let janitor = rate_limit::spawn_janitor(state.limiter.clone(), cfg.rate_limit_window());
    let app = proxy_router(state);

    let addr = cfg.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    janitor.abort();
    pool.close().await;
    info!("database pool closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

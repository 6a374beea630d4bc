use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::handlers::{db_connection, external_db, health, not_found, proxy, public_ip};
use crate::middleware::rate_limit::{self, IpRateLimiter};
use crate::middleware::request_log::log_request;

#[derive(Clone)]
pub struct ProxyState {
    pub cfg: Arc<Config>,
    pub pool: PgPool,
    pub limiter: Arc<IpRateLimiter>,
}

impl ProxyState {
    pub fn new(cfg: Arc<Config>, pool: PgPool) -> Self {
        let limiter = Arc::new(IpRateLimiter::new(
            cfg.rate_limit_window(),
            cfg.rate_limit_max_requests,
        ));
        Self { cfg, pool, limiter }
    }

    /// Raw driver text for the `details` field, when exposing it is enabled.
    pub fn details(&self, raw: &str) -> Option<String> {
        self.cfg.expose_error_details.then(|| raw.to_string())
    }
}

pub fn proxy_router(state: ProxyState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);

    let api = Router::new()
        .route("/test-connection", post(proxy::test_connection))
        .route("/query", post(proxy::execute_query))
        .route("/tables", get(proxy::list_tables))
        .route("/tables/{table_name}/schema", get(proxy::table_schema))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::limit_by_ip));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/db-connection", post(db_connection::db_connection_handler))
        .route("/external-db", post(external_db::external_query_handler))
        .route(
            "/external-db/init-schema",
            post(external_db::init_schema_handler),
        )
        .route("/get-public-ip", get(public_ip::public_ip_handler))
        .nest("/api", api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.cfg.body_limit_bytes))
        .layer(from_fn(log_request))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

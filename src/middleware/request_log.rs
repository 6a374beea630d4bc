use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::middleware::client_ip::{ClientIp, user_agent};

pub async fn log_request(req: Request, next: Next) -> Response {
    let ClientIp(ip) = ClientIp::from_parts(req.extensions(), req.headers());
    info!(
        method = %req.method(),
        path = %req.uri().path(),
        ip = %ip,
        user_agent = %user_agent(req.headers()),
        "incoming request"
    );
    next.run(req).await
}

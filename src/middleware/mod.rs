pub mod auth;
pub mod client_ip;
pub mod function_request;
pub mod rate_limit;
pub mod request_log;

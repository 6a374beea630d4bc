pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

pub use config::Config;
pub use error::ProxyError;
pub use router::{ProxyState, proxy_router};
pub use service::classifier::DbFailure;

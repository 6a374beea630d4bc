pub mod db_connection;
pub mod external_db;
pub mod health;
pub mod proxy;
pub mod public_ip;

use crate::error::ProxyError;

/// Fallback for every unmatched route.
pub async fn not_found() -> ProxyError {
    ProxyError::NotFound("Endpoint not found")
}

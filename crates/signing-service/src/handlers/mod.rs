pub mod jwks_handler;
pub mod me_handler;
pub mod metrics_handler;

pub use jwks_handler::handle_get_jwks;
pub use me_handler::handle_get_me;
pub use metrics_handler::metrics_handler;

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

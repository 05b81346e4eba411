use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: eventra_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Event bus for publishing platform events (ticket mailer input).
    pub bus: Arc<eventra_notify::EventBus>,
}

use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: ledger_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Payout lifecycle notifications are published here.
    pub event_bus: Arc<ledger_events::EventBus>,
}

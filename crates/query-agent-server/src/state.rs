//! Application State

use std::sync::Arc;

use query_agent_core::ChatService;
use tokio_util::sync::CancellationToken;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Request pipeline; immutable after startup
    pub service: Arc<ChatService>,

    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: ChatService) -> Self {
        Self {
            service: Arc::new(service),
            shutdown: CancellationToken::new(),
        }
    }
}

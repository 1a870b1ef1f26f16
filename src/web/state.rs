//! Shared state for the HTTP push adapter.

use crate::agents::DeliveryHandler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn DeliveryHandler>,
}

impl AppState {
    pub fn new(handler: Arc<dyn DeliveryHandler>) -> Self {
        Self { handler }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("role", &self.handler.role())
            .field("agent_id", &self.handler.agent_id())
            .finish()
    }
}

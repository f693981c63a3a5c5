use crate::call::{CallRegistry, SessionContext};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active call sessions (call_id → session)
    pub registry: CallRegistry,
    /// Collaborators and policy handed to every new session
    pub ctx: SessionContext,
}

impl AppState {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            registry: CallRegistry::new(),
            ctx,
        }
    }
}

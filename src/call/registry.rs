use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::session::CallSession;

/// Explicit per-process registry of active call sessions.
///
/// Created at process start and passed to whichever component needs it;
/// cleared on shutdown. There is no other cross-call shared mutable state.
#[derive(Clone, Default)]
pub struct CallRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<CallSession>>>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, call_id: String, session: Arc<CallSession>) {
        self.sessions.write().await.insert(call_id, session);
    }

    pub async fn get(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().await.get(call_id).cloned()
    }

    pub async fn remove(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.sessions.write().await.remove(call_id)
    }

    pub async fn contains(&self, call_id: &str) -> bool {
        self.sessions.read().await.contains_key(call_id)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Take every registered session, leaving the registry empty. Used at
    /// process shutdown to end calls in flight.
    pub async fn drain(&self) -> Vec<Arc<CallSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, s)| s).collect()
    }
}

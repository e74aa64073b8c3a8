use std::sync::Arc;

use pipeline::AdapterFactory;
use sessions::SessionStore;

/// Shared handles every route needs: the session registry and the factory
/// producing the per-request external adapters.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub adapters: Arc<dyn AdapterFactory>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionStore>, adapters: Arc<dyn AdapterFactory>) -> Self {
        Self { sessions, adapters }
    }
}

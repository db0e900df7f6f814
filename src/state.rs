use crate::auth::AuthProvider;
use crate::coordinator::Coordinator;
use crate::storage::LocalStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub local: Arc<LocalStore>,
    pub auth: Option<Arc<dyn AuthProvider>>,
}

impl AppState {
    pub fn new(
        coordinator: Coordinator,
        local: Arc<LocalStore>,
        auth: Option<Arc<dyn AuthProvider>>,
    ) -> Self {
        Self {
            coordinator,
            local,
            auth,
        }
    }
}

use std::sync::Arc;

use crate::{
    auth::{provider::AuthProvider, roles::RoleResolver, session::SessionVerifier},
    config::AppConfig,
    storage::ObjectStorage,
    store::RecordStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<dyn RecordStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: SessionVerifier,
    pub roles: RoleResolver,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
        auth: Arc<dyn AuthProvider>,
        roles: RoleResolver,
    ) -> Self {
        let sessions = SessionVerifier::from_config(&config);
        Self {
            config: Arc::new(config),
            records,
            storage,
            auth,
            sessions,
            roles,
        }
    }
}

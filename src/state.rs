use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::{Config, SESSION_TTL_MAX_SECS};
use crate::session::SessionStore;
use crate::utils::types::Pool;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: Pool,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: Pool, config: Config) -> Self {
        let sessions = SessionStore::new(
            chrono::Duration::seconds(config.session_ttl_secs.clamp(1, SESSION_TTL_MAX_SECS)),
            config.session_cookie_secure,
        );

        Self {
            pool,
            sessions,
            config: Arc::new(config),
        }
    }
}

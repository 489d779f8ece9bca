use std::sync::Arc;

use crate::config::Config;
use crate::generation::generator::ContentGenerator;
use crate::sessions::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable content generator. Default: LlmGenerator (Claude).
    pub generator: Arc<dyn ContentGenerator>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config, generator: Arc<dyn ContentGenerator>) -> Self {
        let sessions = SessionRegistry::new(config.max_sessions, config.undo_policy);
        Self {
            config,
            generator,
            sessions,
        }
    }
}

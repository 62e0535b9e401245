use std::sync::Arc;

use crate::config::AppConfig;
use crate::sessions::SessionStore;
use crate::slack::SlackClient;
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub slack: SlackClient,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let slack = SlackClient::new(&config);
        Self {
            config: Arc::new(config),
            slack,
        }
    }

    /// A record store backed by the real bookmark API. Cheap to build per
    /// request; the underlying HTTP client is shared.
    pub fn record_store(&self) -> RecordStore<SlackClient> {
        RecordStore::new(self.slack.clone(), &self.config)
    }

    pub fn session_store(&self) -> SessionStore<SlackClient> {
        SessionStore::new(self.slack.clone())
    }
}

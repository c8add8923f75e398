use std::sync::Arc;

use crate::config::Settings;
use crate::db::Store;
use crate::services::email::Mailer;
use crate::services::storage::FileStore;

/// Everything a handler needs, managed by Rocket.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub files: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        AppState {
            settings: Arc::new(settings),
            store,
            mailer,
            files,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}

pub mod mongo;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use mongo::MongoStore;
pub use store::*;

use log::{error, info};
use rocket::fairing::AdHoc;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::email::SmtpMailer;
use crate::services::storage::LocalFileStore;
use crate::state::AppState;

/// Connects to MongoDB and manages the shared `AppState`. Launch is aborted
/// when the database is unreachable.
pub fn init(settings: Settings) -> AdHoc {
    AdHoc::try_on_ignite("MongoDB", move |rocket| async move {
        match MongoStore::connect(&settings.mongodb_uri, &settings.database_name).await {
            Ok(store) => {
                info!("✓ MongoDB connected successfully");
                let mailer = SmtpMailer::new(settings.mail.clone());
                let files = LocalFileStore::new(&settings.upload_dir, &settings.public_base_url);
                let state = AppState::new(
                    settings,
                    Arc::new(store),
                    Arc::new(mailer),
                    Arc::new(files),
                );
                Ok(rocket.manage(state))
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

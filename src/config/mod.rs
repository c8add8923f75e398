use mongodb::bson::oid::ObjectId;
use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

/// Signing key used when none is configured. Only fit for local development.
pub const DEFAULT_SESSION_SECRET: &str = "default-session-secret";

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").global())
    }

    pub fn session_secret() -> String {
        Self::figment()
            .extract_inner("session_secret")
            .unwrap_or_else(|_| DEFAULT_SESSION_SECRET.to_string())
    }

    pub fn session_ttl_days() -> i64 {
        Self::figment()
            .extract_inner("session_ttl_days")
            .unwrap_or(7)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "finserv-marketplace".to_string())
    }

    pub fn house_account_partner_id() -> Option<String> {
        Self::figment()
            .extract_inner::<String>("house_account_partner_id")
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn admin_email() -> Option<String> {
        Self::figment()
            .extract_inner::<String>("admin_email")
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn public_base_url() -> String {
        Self::figment()
            .extract_inner("public_base_url")
            .unwrap_or_else(|_| "http://localhost:8000".to_string())
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_port() -> u16 {
        Self::figment()
            .extract_inner("mail_port")
            .unwrap_or(587)
    }

    pub fn mail_user() -> String {
        Self::figment()
            .extract_inner("mail_user")
            .unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "FinServ Marketplace <noreply@finserv.example>".to_string())
    }

    pub fn upload_dir() -> String {
        Self::figment()
            .extract_inner("upload_dir")
            .unwrap_or_else(|_| "uploads".to_string())
    }

    /// Browser origins allowed to call the API with credentials, comma
    /// separated in env.
    pub fn cors_origins() -> Vec<String> {
        let figment = Self::figment();
        let origins = match figment.extract_inner::<Vec<String>>("cors_origins") {
            Ok(list) => list,
            Err(_) => figment
                .extract_inner::<String>("cors_origins")
                .map(|raw| raw.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        };
        origins
            .into_iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }

    pub fn bcrypt_cost() -> u32 {
        Self::figment()
            .extract_inner("bcrypt_cost")
            .unwrap_or(bcrypt::DEFAULT_COST)
    }

    pub fn outbox_retry_secs() -> u64 {
        Self::figment()
            .extract_inner("outbox_retry_secs")
            .unwrap_or(60)
    }

    pub fn outbox_max_attempts() -> u32 {
        Self::figment()
            .extract_inner("outbox_max_attempts")
            .unwrap_or(5)
    }

    pub fn settings() -> Settings {
        let house_account_partner_id = Self::house_account_partner_id().and_then(|raw| {
            match ObjectId::parse_str(&raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Ignoring malformed house account partner id '{}'", raw);
                    None
                }
            }
        });

        Settings {
            session_secret: Self::session_secret(),
            session_ttl_days: Self::session_ttl_days(),
            mongodb_uri: Self::mongodb_uri(),
            database_name: Self::database_name(),
            house_account_partner_id,
            admin_email: Self::admin_email(),
            public_base_url: Self::public_base_url().trim_end_matches('/').to_string(),
            mail: MailSettings {
                host: Self::mail_host(),
                port: Self::mail_port(),
                user: Self::mail_user(),
                password: Self::mail_password(),
                from: Self::mail_from(),
            },
            upload_dir: Self::upload_dir(),
            cors_origins: Self::cors_origins(),
            bcrypt_cost: Self::bcrypt_cost(),
            outbox_retry_secs: Self::outbox_retry_secs(),
            outbox_max_attempts: Self::outbox_max_attempts(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

impl MailSettings {
    pub fn is_configured(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

/// Snapshot of the configuration taken at launch.
#[derive(Debug, Clone)]
pub struct Settings {
    pub session_secret: String,
    pub session_ttl_days: i64,
    pub mongodb_uri: String,
    pub database_name: String,
    pub house_account_partner_id: Option<ObjectId>,
    pub admin_email: Option<String>,
    pub public_base_url: String,
    pub mail: MailSettings,
    pub upload_dir: String,
    pub cors_origins: Vec<String>,
    pub bcrypt_cost: u32,
    pub outbox_retry_secs: u64,
    pub outbox_max_attempts: u32,
}

impl Settings {
    /// Session tokens signed with a publicly known key can be forged.
    pub fn uses_default_session_secret(&self) -> bool {
        self.session_secret.trim().is_empty() || self.session_secret == DEFAULT_SESSION_SECRET
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.public_base_url, token)
    }
}

#[cfg(test)]
mod tests {
    use crate::services::testing::test_settings;

    use super::*;

    #[test]
    fn default_session_secret_is_flagged() {
        let mut settings = test_settings();
        assert!(!settings.uses_default_session_secret());

        settings.session_secret = DEFAULT_SESSION_SECRET.to_string();
        assert!(settings.uses_default_session_secret());

        settings.session_secret = "  ".to_string();
        assert!(settings.uses_default_session_secret());
    }
}

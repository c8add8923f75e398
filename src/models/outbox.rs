use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// A best-effort effect that follows an authoritative write.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    Email(OutgoingEmail),
    DeleteFiles { urls: Vec<String> },
}

impl SideEffect {
    pub fn describe(&self) -> String {
        match self {
            SideEffect::Email(email) => format!("email '{}' to {}", email.subject, email.to),
            SideEffect::DeleteFiles { urls } => format!("deletion of {} file(s)", urls.len()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub effect: SideEffect,
    pub attempts: u32,
    pub delivered: bool,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl OutboxEntry {
    pub fn pending(effect: SideEffect) -> Self {
        let now = DateTime::now();
        OutboxEntry {
            id: None,
            effect,
            attempts: 0,
            delivered: false,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

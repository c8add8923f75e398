use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    Application, OutboxEntry, Partner, Role, ServiceCategory, SideEffect, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("document encoding error: {0}")]
    Encoding(String),

    #[error("transaction aborted: {0}")]
    Transaction(String),
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which credential collection a document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRef {
    User(ObjectId),
    Partner(ObjectId),
}

impl AccountRef {
    pub fn role(self) -> Role {
        match self {
            AccountRef::User(_) => Role::Normal,
            AccountRef::Partner(_) => Role::Partner,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResetTarget {
    pub account: AccountRef,
    pub expires_at: Option<DateTime>,
}

/// Predicate shared by every cross-category listing. Empty clauses match
/// everything; set clauses are AND-ed. Status is deliberately absent: the
/// archived exclusion runs in memory after the fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub submitted_by: Option<ObjectId>,
    pub applicant_in: Option<Vec<ObjectId>>,
}

impl ApplicationFilter {
    pub fn submitted_by(id: ObjectId) -> Self {
        ApplicationFilter {
            submitted_by: Some(id),
            ..Default::default()
        }
    }

    pub fn applicant(id: ObjectId) -> Self {
        Self::applicants(vec![id])
    }

    pub fn applicants(ids: Vec<ObjectId>) -> Self {
        ApplicationFilter {
            applicant_in: Some(ids),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartnerListFilter {
    pub approved: Option<bool>,
}

/// Persistence boundary. The MongoDB implementation backs production; an
/// in-memory one backs the tests.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    // users
    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<ObjectId>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn list_users_by_partner(&self, partner_id: ObjectId) -> StoreResult<Vec<User>>;
    async fn set_user_partner(&self, user_id: ObjectId, partner_id: Option<ObjectId>) -> StoreResult<bool>;
    async fn count_users(&self) -> StoreResult<u64>;

    // partners
    async fn find_partner(&self, id: ObjectId) -> StoreResult<Option<Partner>>;
    async fn find_partner_by_email(&self, email: &str) -> StoreResult<Option<Partner>>;
    async fn insert_partner(&self, partner: &Partner) -> StoreResult<ObjectId>;
    /// Never returns admin accounts.
    async fn list_partners(&self, filter: PartnerListFilter) -> StoreResult<Vec<Partner>>;
    async fn set_partner_approval(&self, id: ObjectId, approved: bool) -> StoreResult<bool>;
    /// Atomically un-approves the partner and releases every client that
    /// points at it. Returns the number of released clients.
    async fn deactivate_partner(&self, id: ObjectId) -> StoreResult<u64>;

    // credentials
    async fn set_reset_token(&self, account: AccountRef, digest: &str, expires_at: DateTime) -> StoreResult<()>;
    async fn find_by_reset_token(&self, digest: &str) -> StoreResult<Option<ResetTarget>>;
    /// Stores the hash and clears any pending reset token.
    async fn update_password(&self, account: AccountRef, password_hash: &str) -> StoreResult<()>;

    // applications
    async fn insert_application(&self, app: &Application) -> StoreResult<ObjectId>;
    async fn find_application(&self, category: ServiceCategory, id: ObjectId) -> StoreResult<Option<Application>>;
    async fn find_applications(&self, category: ServiceCategory, filter: &ApplicationFilter) -> StoreResult<Vec<Application>>;
    async fn set_application_status(&self, category: ServiceCategory, id: ObjectId, status: &str, at: DateTime) -> StoreResult<bool>;
    async fn replace_form_data(&self, category: ServiceCategory, id: ObjectId, form_data: &Value, at: DateTime) -> StoreResult<bool>;
    /// Atomically deletes the user and every application across all
    /// categories whose applicant is that user. Returns the deleted
    /// applications.
    async fn delete_client(&self, user_id: ObjectId) -> StoreResult<Vec<Application>>;

    // outbox
    async fn enqueue_side_effect(&self, entry: &OutboxEntry) -> StoreResult<ObjectId>;
    async fn pending_side_effects(&self, max_attempts: u32, limit: i64) -> StoreResult<Vec<OutboxEntry>>;
    async fn complete_side_effect(&self, id: ObjectId) -> StoreResult<()>;
    /// Records a failed attempt; `remaining` replaces the stored effect.
    async fn fail_side_effect(&self, id: ObjectId, remaining: &SideEffect, error: &str) -> StoreResult<()>;
}

//! In-memory `Store` used by the test suites.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::store::{
    AccountRef, ApplicationFilter, PartnerListFilter, ResetTarget, Store, StoreResult,
};
use crate::models::{
    Application, OutboxEntry, Partner, ServiceCategory, SideEffect, User,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    partners: Vec<Partner>,
    applications: HashMap<ServiceCategory, Vec<Application>>,
    outbox: Vec<OutboxEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().expect("memory store poisoned");
        f(&mut state)
    }

    pub fn outbox(&self) -> Vec<OutboxEntry> {
        self.with(|s| s.outbox.clone())
    }
}

/// Same clauses the Mongo query document builds, AND-ed.
fn matches(filter: &ApplicationFilter, app: &Application) -> bool {
    if let Some(id) = filter.submitted_by {
        if app.submitted_by.user_id != id {
            return false;
        }
    }
    match &filter.applicant_in {
        Some(ids) => app.applicant_details.user_id.is_some_and(|id| ids.contains(&id)),
        None => true,
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.with(|s| s.users.iter().find(|u| u.id == Some(id)).cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.with(|s| s.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn insert_user(&self, user: &User) -> StoreResult<ObjectId> {
        let id = user.id.unwrap_or_else(ObjectId::new);
        let mut stored = user.clone();
        stored.id = Some(id);
        self.with(|s| s.users.push(stored));
        Ok(id)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.with(|s| s.users.clone()))
    }

    async fn list_users_by_partner(&self, partner_id: ObjectId) -> StoreResult<Vec<User>> {
        Ok(self.with(|s| {
            s.users
                .iter()
                .filter(|u| u.partner_id == Some(partner_id))
                .cloned()
                .collect()
        }))
    }

    async fn set_user_partner(
        &self,
        user_id: ObjectId,
        partner_id: Option<ObjectId>,
    ) -> StoreResult<bool> {
        Ok(self.with(|s| match s.users.iter_mut().find(|u| u.id == Some(user_id)) {
            Some(user) => {
                user.partner_id = partner_id;
                user.updated_at = DateTime::now();
                true
            }
            None => false,
        }))
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.with(|s| s.users.len() as u64))
    }

    async fn find_partner(&self, id: ObjectId) -> StoreResult<Option<Partner>> {
        Ok(self.with(|s| s.partners.iter().find(|p| p.id == Some(id)).cloned()))
    }

    async fn find_partner_by_email(&self, email: &str) -> StoreResult<Option<Partner>> {
        Ok(self.with(|s| s.partners.iter().find(|p| p.email == email).cloned()))
    }

    async fn insert_partner(&self, partner: &Partner) -> StoreResult<ObjectId> {
        let id = partner.id.unwrap_or_else(ObjectId::new);
        let mut stored = partner.clone();
        stored.id = Some(id);
        self.with(|s| s.partners.push(stored));
        Ok(id)
    }

    async fn list_partners(&self, filter: PartnerListFilter) -> StoreResult<Vec<Partner>> {
        Ok(self.with(|s| {
            s.partners
                .iter()
                .filter(|p| !p.is_admin)
                .filter(|p| filter.approved.map_or(true, |a| p.is_approved == a))
                .cloned()
                .collect()
        }))
    }

    async fn set_partner_approval(&self, id: ObjectId, approved: bool) -> StoreResult<bool> {
        Ok(self.with(|s| match s.partners.iter_mut().find(|p| p.id == Some(id)) {
            Some(partner) => {
                partner.is_approved = approved;
                partner.updated_at = DateTime::now();
                true
            }
            None => false,
        }))
    }

    async fn deactivate_partner(&self, id: ObjectId) -> StoreResult<u64> {
        Ok(self.with(|s| {
            if let Some(partner) = s.partners.iter_mut().find(|p| p.id == Some(id)) {
                partner.is_approved = false;
            }
            let mut released = 0;
            for user in s.users.iter_mut().filter(|u| u.partner_id == Some(id)) {
                user.partner_id = None;
                released += 1;
            }
            released
        }))
    }

    async fn set_reset_token(
        &self,
        account: AccountRef,
        digest: &str,
        expires_at: DateTime,
    ) -> StoreResult<()> {
        self.with(|s| match account {
            AccountRef::User(id) => {
                if let Some(u) = s.users.iter_mut().find(|u| u.id == Some(id)) {
                    u.reset_token = Some(digest.to_string());
                    u.reset_token_expiry = Some(expires_at);
                }
            }
            AccountRef::Partner(id) => {
                if let Some(p) = s.partners.iter_mut().find(|p| p.id == Some(id)) {
                    p.reset_token = Some(digest.to_string());
                    p.reset_token_expiry = Some(expires_at);
                }
            }
        });
        Ok(())
    }

    async fn find_by_reset_token(&self, digest: &str) -> StoreResult<Option<ResetTarget>> {
        Ok(self.with(|s| {
            let user = s
                .users
                .iter()
                .find(|u| u.reset_token.as_deref() == Some(digest))
                .and_then(|u| {
                    u.id.map(|id| ResetTarget {
                        account: AccountRef::User(id),
                        expires_at: u.reset_token_expiry,
                    })
                });
            user.or_else(|| {
                s.partners
                    .iter()
                    .find(|p| p.reset_token.as_deref() == Some(digest))
                    .and_then(|p| {
                        p.id.map(|id| ResetTarget {
                            account: AccountRef::Partner(id),
                            expires_at: p.reset_token_expiry,
                        })
                    })
            })
        }))
    }

    async fn update_password(&self, account: AccountRef, password_hash: &str) -> StoreResult<()> {
        self.with(|s| match account {
            AccountRef::User(id) => {
                if let Some(u) = s.users.iter_mut().find(|u| u.id == Some(id)) {
                    u.password = password_hash.to_string();
                    u.reset_token = None;
                    u.reset_token_expiry = None;
                }
            }
            AccountRef::Partner(id) => {
                if let Some(p) = s.partners.iter_mut().find(|p| p.id == Some(id)) {
                    p.password = password_hash.to_string();
                    p.reset_token = None;
                    p.reset_token_expiry = None;
                }
            }
        });
        Ok(())
    }

    async fn insert_application(&self, app: &Application) -> StoreResult<ObjectId> {
        let id = app.id.unwrap_or_else(ObjectId::new);
        let mut stored = app.clone();
        stored.id = Some(id);
        self.with(|s| {
            s.applications
                .entry(app.service_category)
                .or_default()
                .push(stored)
        });
        Ok(id)
    }

    async fn find_application(
        &self,
        category: ServiceCategory,
        id: ObjectId,
    ) -> StoreResult<Option<Application>> {
        Ok(self.with(|s| {
            s.applications
                .get(&category)
                .and_then(|apps| apps.iter().find(|a| a.id == Some(id)).cloned())
        }))
    }

    async fn find_applications(
        &self,
        category: ServiceCategory,
        filter: &ApplicationFilter,
    ) -> StoreResult<Vec<Application>> {
        Ok(self.with(|s| {
            s.applications
                .get(&category)
                .map(|apps| apps.iter().filter(|a| matches(filter, a)).cloned().collect())
                .unwrap_or_default()
        }))
    }

    async fn set_application_status(
        &self,
        category: ServiceCategory,
        id: ObjectId,
        status: &str,
        at: DateTime,
    ) -> StoreResult<bool> {
        Ok(self.with(|s| {
            match s
                .applications
                .get_mut(&category)
                .and_then(|apps| apps.iter_mut().find(|a| a.id == Some(id)))
            {
                Some(app) => {
                    app.status = status.to_string();
                    app.updated_at = at;
                    true
                }
                None => false,
            }
        }))
    }

    async fn replace_form_data(
        &self,
        category: ServiceCategory,
        id: ObjectId,
        form_data: &Value,
        at: DateTime,
    ) -> StoreResult<bool> {
        Ok(self.with(|s| {
            match s
                .applications
                .get_mut(&category)
                .and_then(|apps| apps.iter_mut().find(|a| a.id == Some(id)))
            {
                Some(app) => {
                    app.form_data = form_data.clone();
                    app.updated_at = at;
                    true
                }
                None => false,
            }
        }))
    }

    async fn delete_client(&self, user_id: ObjectId) -> StoreResult<Vec<Application>> {
        Ok(self.with(|s| {
            let mut deleted = Vec::new();
            for apps in s.applications.values_mut() {
                let (gone, kept): (Vec<_>, Vec<_>) = apps
                    .drain(..)
                    .partition(|a| a.applicant_details.user_id == Some(user_id));
                *apps = kept;
                deleted.extend(gone);
            }
            s.users.retain(|u| u.id != Some(user_id));
            deleted
        }))
    }

    async fn enqueue_side_effect(&self, entry: &OutboxEntry) -> StoreResult<ObjectId> {
        let id = ObjectId::new();
        let mut stored = entry.clone();
        stored.id = Some(id);
        self.with(|s| s.outbox.push(stored));
        Ok(id)
    }

    async fn pending_side_effects(
        &self,
        max_attempts: u32,
        limit: i64,
    ) -> StoreResult<Vec<OutboxEntry>> {
        Ok(self.with(|s| {
            s.outbox
                .iter()
                .filter(|e| !e.delivered && e.attempts >= 1 && e.attempts < max_attempts)
                .take(limit.max(0) as usize)
                .cloned()
                .collect()
        }))
    }

    async fn complete_side_effect(&self, id: ObjectId) -> StoreResult<()> {
        self.with(|s| {
            if let Some(entry) = s.outbox.iter_mut().find(|e| e.id == Some(id)) {
                entry.delivered = true;
                entry.attempts += 1;
                entry.last_error = None;
            }
        });
        Ok(())
    }

    async fn fail_side_effect(
        &self,
        id: ObjectId,
        remaining: &SideEffect,
        error: &str,
    ) -> StoreResult<()> {
        self.with(|s| {
            if let Some(entry) = s.outbox.iter_mut().find(|e| e.id == Some(id)) {
                entry.effect = remaining.clone();
                entry.attempts += 1;
                entry.last_error = Some(error.to_string());
            }
        });
        Ok(())
    }
}

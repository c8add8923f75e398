use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::options::FindOptions;
use mongodb::{Client, ClientSession, Collection, Database};
use rocket::futures::TryStreamExt;
use serde_json::Value;

use super::store::{
    AccountRef, ApplicationFilter, PartnerListFilter, ResetTarget, Store, StoreError, StoreResult,
};
use crate::models::{
    Application, OutboxEntry, Partner, ServiceCategory, SideEffect, User,
};

const USERS: &str = "users";
const PARTNERS: &str = "partners";
const OUTBOX: &str = "outbox";

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;

        // Test connection
        client
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await?;

        Ok(MongoStore {
            db: client.database(database),
            client,
        })
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn partners(&self) -> Collection<Partner> {
        self.db.collection(PARTNERS)
    }

    fn applications(&self, category: ServiceCategory) -> Collection<Application> {
        self.db.collection(category.collection())
    }

    fn outbox(&self) -> Collection<OutboxEntry> {
        self.db.collection(OUTBOX)
    }

    async fn start_transaction(&self) -> StoreResult<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    async fn finish_transaction<T>(
        mut session: ClientSession,
        outcome: StoreResult<T>,
    ) -> StoreResult<T> {
        match outcome {
            Ok(value) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|e| StoreError::Transaction(e.to_string()))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    log::error!("Failed to abort transaction: {}", abort);
                }
                Err(e)
            }
        }
    }

    async fn deactivate_in(
        &self,
        session: &mut ClientSession,
        id: ObjectId,
    ) -> StoreResult<u64> {
        let now = DateTime::now();

        self.partners()
            .update_one_with_session(
                doc! { "_id": id },
                doc! { "$set": { "isApproved": false, "updatedAt": now } },
                None,
                session,
            )
            .await?;

        let released = self
            .users()
            .update_many_with_session(
                doc! { "partnerId": id },
                doc! { "$set": { "partnerId": Bson::Null, "updatedAt": now } },
                None,
                session,
            )
            .await?;

        Ok(released.modified_count)
    }

    async fn delete_client_in(
        &self,
        session: &mut ClientSession,
        user_id: ObjectId,
    ) -> StoreResult<Vec<Application>> {
        let filter = doc! { "applicantDetails.userId": user_id };
        let mut deleted = Vec::new();

        for category in ServiceCategory::ALL {
            let collection = self.applications(category);
            let mut cursor = collection
                .find_with_session(filter.clone(), None, session)
                .await?;
            let found: Vec<Application> = cursor.stream(session).try_collect().await?;

            collection
                .delete_many_with_session(filter.clone(), None, session)
                .await?;
            deleted.extend(found);
        }

        self.users()
            .delete_one_with_session(doc! { "_id": user_id }, None, session)
            .await?;

        Ok(deleted)
    }
}

fn inserted_object_id(id: Bson) -> StoreResult<ObjectId> {
    id.as_object_id()
        .ok_or_else(|| StoreError::Encoding("inserted id is not an ObjectId".to_string()))
}

fn filter_document(filter: &ApplicationFilter) -> Document {
    let mut document = doc! {};
    if let Some(id) = filter.submitted_by {
        document.insert("submittedBy.userId", id);
    }
    if let Some(ids) = &filter.applicant_in {
        document.insert("applicantDetails.userId", doc! { "$in": ids.clone() });
    }
    document
}

/// Admins never show up in partner listings.
fn partner_list_document(filter: PartnerListFilter) -> Document {
    let mut document = doc! { "isAdmin": { "$ne": true } };
    if let Some(approved) = filter.approved {
        document.insert("isApproved", approved);
    }
    document
}

/// Failed at least once, not yet exhausted.
fn retryable_document(max_attempts: u32) -> Document {
    doc! { "delivered": false, "attempts": { "$gte": 1, "$lt": max_attempts as i64 } }
}

fn account_collection(account: AccountRef) -> (&'static str, ObjectId) {
    match account {
        AccountRef::User(id) => (USERS, id),
        AccountRef::Partner(id) => (PARTNERS, id),
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<ObjectId> {
        let result = self.users().insert_one(user, None).await?;
        inserted_object_id(result.inserted_id)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
        let cursor = self.users().find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_users_by_partner(&self, partner_id: ObjectId) -> StoreResult<Vec<User>> {
        let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
        let cursor = self
            .users()
            .find(doc! { "partnerId": partner_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_user_partner(
        &self,
        user_id: ObjectId,
        partner_id: Option<ObjectId>,
    ) -> StoreResult<bool> {
        let partner = partner_id.map(Bson::ObjectId).unwrap_or(Bson::Null);
        let result = self
            .users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "partnerId": partner, "updatedAt": DateTime::now() } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.users().count_documents(None, None).await?)
    }

    async fn find_partner(&self, id: ObjectId) -> StoreResult<Option<Partner>> {
        Ok(self.partners().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_partner_by_email(&self, email: &str) -> StoreResult<Option<Partner>> {
        Ok(self.partners().find_one(doc! { "email": email }, None).await?)
    }

    async fn insert_partner(&self, partner: &Partner) -> StoreResult<ObjectId> {
        let result = self.partners().insert_one(partner, None).await?;
        inserted_object_id(result.inserted_id)
    }

    async fn list_partners(&self, filter: PartnerListFilter) -> StoreResult<Vec<Partner>> {
        let query = partner_list_document(filter);
        let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
        let cursor = self.partners().find(query, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_partner_approval(&self, id: ObjectId, approved: bool) -> StoreResult<bool> {
        let result = self
            .partners()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "isApproved": approved, "updatedAt": DateTime::now() } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn deactivate_partner(&self, id: ObjectId) -> StoreResult<u64> {
        let mut session = self.start_transaction().await?;
        let outcome = self.deactivate_in(&mut session, id).await;
        Self::finish_transaction(session, outcome).await
    }

    async fn set_reset_token(
        &self,
        account: AccountRef,
        digest: &str,
        expires_at: DateTime,
    ) -> StoreResult<()> {
        let (collection, id) = account_collection(account);
        self.db
            .collection::<Document>(collection)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "resetToken": digest, "resetTokenExpiry": expires_at } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_by_reset_token(&self, digest: &str) -> StoreResult<Option<ResetTarget>> {
        let filter = doc! { "resetToken": digest };

        if let Some(user) = self.users().find_one(filter.clone(), None).await? {
            if let Some(id) = user.id {
                return Ok(Some(ResetTarget {
                    account: AccountRef::User(id),
                    expires_at: user.reset_token_expiry,
                }));
            }
        }

        if let Some(partner) = self.partners().find_one(filter, None).await? {
            if let Some(id) = partner.id {
                return Ok(Some(ResetTarget {
                    account: AccountRef::Partner(id),
                    expires_at: partner.reset_token_expiry,
                }));
            }
        }

        Ok(None)
    }

    async fn update_password(&self, account: AccountRef, password_hash: &str) -> StoreResult<()> {
        let (collection, id) = account_collection(account);
        self.db
            .collection::<Document>(collection)
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": { "password": password_hash, "updatedAt": DateTime::now() },
                    "$unset": { "resetToken": "", "resetTokenExpiry": "" }
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn insert_application(&self, app: &Application) -> StoreResult<ObjectId> {
        let result = self
            .applications(app.service_category)
            .insert_one(app, None)
            .await?;
        inserted_object_id(result.inserted_id)
    }

    async fn find_application(
        &self,
        category: ServiceCategory,
        id: ObjectId,
    ) -> StoreResult<Option<Application>> {
        Ok(self
            .applications(category)
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn find_applications(
        &self,
        category: ServiceCategory,
        filter: &ApplicationFilter,
    ) -> StoreResult<Vec<Application>> {
        let cursor = self
            .applications(category)
            .find(filter_document(filter), None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_application_status(
        &self,
        category: ServiceCategory,
        id: ObjectId,
        status: &str,
        at: DateTime,
    ) -> StoreResult<bool> {
        let result = self
            .applications(category)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": status, "updatedAt": at } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn replace_form_data(
        &self,
        category: ServiceCategory,
        id: ObjectId,
        form_data: &Value,
        at: DateTime,
    ) -> StoreResult<bool> {
        let form = bson::to_bson(form_data)?;
        let result = self
            .applications(category)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "formData": form, "updatedAt": at } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_client(&self, user_id: ObjectId) -> StoreResult<Vec<Application>> {
        let mut session = self.start_transaction().await?;
        let outcome = self.delete_client_in(&mut session, user_id).await;
        Self::finish_transaction(session, outcome).await
    }

    async fn enqueue_side_effect(&self, entry: &OutboxEntry) -> StoreResult<ObjectId> {
        let result = self.outbox().insert_one(entry, None).await?;
        inserted_object_id(result.inserted_id)
    }

    async fn pending_side_effects(
        &self,
        max_attempts: u32,
        limit: i64,
    ) -> StoreResult<Vec<OutboxEntry>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .limit(limit)
            .build();
        let cursor = self
            .outbox()
            .find(retryable_document(max_attempts), options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn complete_side_effect(&self, id: ObjectId) -> StoreResult<()> {
        self.outbox()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": { "delivered": true, "lastError": Bson::Null, "updatedAt": DateTime::now() },
                    "$inc": { "attempts": 1 }
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn fail_side_effect(
        &self,
        id: ObjectId,
        remaining: &SideEffect,
        error: &str,
    ) -> StoreResult<()> {
        let effect = bson::to_bson(remaining)?;
        self.outbox()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": { "effect": effect, "lastError": error, "updatedAt": DateTime::now() },
                    "$inc": { "attempts": 1 }
                },
                None,
            )
            .await?;
        Ok(())
    }
}

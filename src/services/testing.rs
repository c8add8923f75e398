//! Fixtures shared by the service and route tests.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::email::{MailError, Mailer};
use super::storage::{DeletionReport, FileStore, StorageError};
use crate::config::{MailSettings, Settings};
use crate::db::memory::MemoryStore;
use crate::db::Store;
use crate::models::{
    ApplicantDetails, Application, BusinessModel, Identity, OutgoingEmail, Partner, Role,
    ServiceCategory, SubmittedBy, User,
};
use crate::state::AppState;

pub const PASSWORD: &str = "correct-horse-battery";

/// Where both file stores under test put their files.
pub const UPLOADS: &str = "http://localhost:8000/uploads/";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[rocket::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::NotConfigured);
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFileStore {
    requested: Mutex<Vec<Vec<String>>>,
    deleted: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingFileStore {
    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Every URL list handed to `delete`, in call order.
    pub fn requested(&self) -> Vec<Vec<String>> {
        self.requested.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl FileStore for RecordingFileStore {
    async fn store(&self, _bytes: &[u8], extension: &str) -> Result<String, StorageError> {
        Ok(format!("{}{}.{}", UPLOADS, ObjectId::new().to_hex(), extension))
    }

    async fn delete(&self, urls: &[String]) -> DeletionReport {
        self.requested.lock().unwrap().push(urls.to_vec());
        assert!(urls.iter().all(|url| self.manages(url)), "asked to delete a foreign file");
        let failing = self.failing.lock().unwrap().clone();

        let mut report = DeletionReport::default();
        for url in urls {
            if failing.contains(url) {
                report.failed.push((url.clone(), "storage unavailable".to_string()));
            } else {
                self.deleted.lock().unwrap().push(url.clone());
                report.deleted.push(url.clone());
            }
        }
        report
    }

    fn manages(&self, url: &str) -> bool {
        url.strip_prefix(UPLOADS).is_some_and(|name| !name.is_empty() && !name.contains('/'))
    }
}

pub fn test_settings() -> Settings {
    Settings {
        session_secret: "test-session-secret".to_string(),
        session_ttl_days: 7,
        mongodb_uri: "mongodb://unused".to_string(),
        database_name: "unused".to_string(),
        house_account_partner_id: None,
        admin_email: Some("ops@finserv.example".to_string()),
        public_base_url: "http://localhost:8000".to_string(),
        mail: MailSettings {
            host: "localhost".to_string(),
            port: 25,
            user: String::new(),
            password: String::new(),
            from: "FinServ <noreply@finserv.example>".to_string(),
        },
        upload_dir: "uploads".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        bcrypt_cost: 4,
        outbox_retry_secs: 60,
        outbox_max_attempts: 5,
    }
}

pub struct TestEnv {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub files: Arc<RecordingFileStore>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let files = Arc::new(RecordingFileStore::default());
        let state = AppState::new(settings, store.clone(), mailer.clone(), files.clone());
        TestEnv { state, store, mailer, files }
    }

    pub fn hash(&self) -> String {
        bcrypt::hash(PASSWORD, 4).unwrap()
    }

    pub async fn partner(&self, email: &str, approved: bool) -> Partner {
        self.insert_partner(email, approved, false).await
    }

    pub async fn admin(&self) -> Partner {
        self.insert_partner("admin@finserv.example", true, true).await
    }

    async fn insert_partner(&self, email: &str, approved: bool, admin: bool) -> Partner {
        let mut partner = Partner {
            id: None,
            email: email.to_string(),
            password: self.hash(),
            business_model: BusinessModel::Referral,
            full_name: Some(format!("Partner {}", email)),
            phone: None,
            personal_details: None,
            business_information: None,
            is_approved: approved,
            is_admin: admin,
            reset_token: None,
            reset_token_expiry: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        partner.id = Some(self.store.insert_partner(&partner).await.unwrap());
        partner
    }

    pub async fn user(&self, email: &str, partner_id: Option<ObjectId>) -> User {
        let mut user = User {
            id: None,
            full_name: format!("Client {}", email),
            email: email.to_string(),
            password: self.hash(),
            phone: None,
            partner_id,
            is_admin: None,
            reset_token: None,
            reset_token_expiry: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        user.id = Some(self.store.insert_user(&user).await.unwrap());
        user
    }

    /// An application whose applicant is `applicant`, submitted by
    /// `submitter` (a user or partner identity).
    pub async fn application(
        &self,
        category: ServiceCategory,
        applicant: &User,
        submitter: &Identity,
        status: &str,
        created_at_millis: i64,
        form_data: Value,
    ) -> Application {
        let mut app = Application {
            id: None,
            application_type: "Personal Loan".to_string(),
            service_category: category,
            status: status.to_string(),
            form_data,
            applicant_details: ApplicantDetails {
                name: applicant.full_name.clone(),
                email: Some(applicant.email.clone()),
                user_id: applicant.id,
            },
            submitted_by: SubmittedBy {
                user_id: submitter.id,
                name: submitter.name.clone(),
                email: submitter.email.clone(),
                role: submitter.role,
            },
            partner_id: submitter.is_partner().then_some(submitter.id),
            created_at: DateTime::from_millis(created_at_millis),
            updated_at: DateTime::from_millis(created_at_millis),
        };
        app.id = Some(self.store.insert_application(&app).await.unwrap());
        app
    }
}

pub fn user_identity(user: &User) -> Identity {
    Identity {
        id: user.id.unwrap(),
        name: user.full_name.clone(),
        email: user.email.clone(),
        role: Role::Normal,
        is_admin: user.is_admin(),
        business_model: None,
        partner_id: user.partner_id,
    }
}

pub fn partner_identity(partner: &Partner) -> Identity {
    Identity {
        id: partner.id.unwrap(),
        name: partner.display_name(),
        email: partner.email.clone(),
        role: Role::Partner,
        is_admin: partner.is_admin,
        business_model: Some(partner.business_model),
        partner_id: None,
    }
}

pub fn sample_form() -> Value {
    json!({
        "personalDetails": { "fullName": "Asha Rao", "mobile": "9876543210" },
        "loanAmount": 500000
    })
}

use mongodb::bson::{oid::ObjectId, DateTime};
use rocket::request::FromParam;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{millis_to_rfc3339, Role};

/// Determines which collection an application lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ServiceCategory {
    Loan,
    CaService,
    GovernmentScheme,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 3] = [
        ServiceCategory::Loan,
        ServiceCategory::CaService,
        ServiceCategory::GovernmentScheme,
    ];

    pub fn collection(self) -> &'static str {
        match self {
            ServiceCategory::Loan => "loan_applications",
            ServiceCategory::CaService => "ca_service_applications",
            ServiceCategory::GovernmentScheme => "government_scheme_applications",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceCategory::Loan => "loan",
            ServiceCategory::CaService => "caService",
            ServiceCategory::GovernmentScheme => "governmentScheme",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "loan" | "loans" => Some(ServiceCategory::Loan),
            "caservice" | "caservices" => Some(ServiceCategory::CaService),
            "governmentscheme" | "governmentschemes" => Some(ServiceCategory::GovernmentScheme),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'a> FromParam<'a> for ServiceCategory {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        ServiceCategory::parse(param).ok_or(param)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ApplicationStatus {
    Submitted,
    #[serde(rename = "In Review")]
    InReview,
    Approved,
    Rejected,
    Archived,
}

impl ApplicationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::InReview => "In Review",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Archived => "Archived",
        }
    }

    /// Case-insensitive; separators inside "in review" are optional.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "submitted" => Some(ApplicationStatus::Submitted),
            "inreview" => Some(ApplicationStatus::InReview),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            "archived" => Some(ApplicationStatus::Archived),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Archived)
    }

    /// Re-writing the current status is always allowed.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if self == next {
            return true;
        }

        match self {
            Submitted => matches!(next, InReview | Approved | Rejected | Archived),
            InReview => matches!(next, Submitted | Approved | Rejected | Archived),
            Approved => matches!(next, InReview | Archived),
            Rejected => matches!(next, InReview | Archived),
            Archived => false,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantDetails {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<ObjectId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedBy {
    pub user_id: ObjectId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Stored document; `status` stays a string so that legacy values still load.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub application_type: String,
    pub service_category: ServiceCategory,
    pub status: String,
    #[serde(default)]
    pub form_data: Value,
    pub applicant_details: ApplicantDetails,
    pub submitted_by: SubmittedBy,
    #[serde(default)]
    pub partner_id: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Application {
    pub fn parsed_status(&self) -> Option<ApplicationStatus> {
        ApplicationStatus::parse(&self.status)
    }

    pub fn is_archived(&self) -> bool {
        self.parsed_status() == Some(ApplicationStatus::Archived)
    }

    /// Nothing moves out of a terminal status and its form is frozen.
    pub fn is_terminal(&self) -> bool {
        self.parsed_status().is_some_and(ApplicationStatus::is_terminal)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationDto {
    pub application_type: String,
    pub form_data: Value,
    /// Required when a partner submits for someone else.
    pub applicant_name: Option<String>,
    pub applicant_email: Option<String>,
    /// One of the submitting partner's clients.
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationDto {
    pub form_data: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateStatusDto {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: String,
    pub application_type: String,
    pub service_category: ServiceCategory,
    pub status: String,
    pub form_data: Value,
    pub applicant_name: String,
    pub applicant_email: Option<String>,
    pub applicant_user_id: Option<String>,
    pub submitted_by_id: String,
    pub submitted_by_name: String,
    pub submitted_by_role: Role,
    pub partner_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Application> for ApplicationResponse {
    fn from(app: Application) -> Self {
        ApplicationResponse {
            id: app.id.map(|id| id.to_hex()).unwrap_or_default(),
            application_type: app.application_type,
            service_category: app.service_category,
            status: app.status,
            form_data: app.form_data,
            applicant_name: app.applicant_details.name,
            applicant_email: app.applicant_details.email,
            applicant_user_id: app.applicant_details.user_id.map(|id| id.to_hex()),
            submitted_by_id: app.submitted_by.user_id.to_hex(),
            submitted_by_name: app.submitted_by.name,
            submitted_by_role: app.submitted_by.role,
            partner_id: app.partner_id.map(|id| id.to_hex()),
            created_at: millis_to_rfc3339(app.created_at),
            updated_at: millis_to_rfc3339(app.updated_at),
        }
    }
}

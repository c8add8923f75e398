use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;
use validator::Validate;

use super::millis_to_rfc3339;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BusinessModel {
    Referral,
    Dsa,
    Merchant,
}

impl BusinessModel {
    pub fn as_str(self) -> &'static str {
        match self {
            BusinessModel::Referral => "referral",
            BusinessModel::Dsa => "dsa",
            BusinessModel::Merchant => "merchant",
        }
    }

    /// DSA and merchant partners register with full KYC-style details.
    pub fn requires_business_profile(self) -> bool {
        !matches!(self, BusinessModel::Referral)
    }
}

impl fmt::Display for BusinessModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub pan_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInformation {
    #[validate(length(min = 1, message = "Business name is required"))]
    pub business_name: String,
    #[serde(default)]
    pub business_type: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A partner account. The operator account is also stored here, flagged
/// with `isAdmin`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password: String,
    pub business_model: BusinessModel,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_details: Option<PersonalDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_information: Option<BusinessInformation>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token_expiry: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Partner {
    /// Referral partners keep their name top-level, the others nest it.
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.personal_details.as_ref().map(|p| p.full_name.clone()))
            .or_else(|| self.business_information.as_ref().map(|b| b.business_name.clone()))
            .unwrap_or_else(|| self.email.clone())
    }

    pub fn contact_phone(&self) -> Option<String> {
        self.phone
            .clone()
            .or_else(|| self.personal_details.as_ref().and_then(|p| p.phone.clone()))
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpPartnerDto {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub confirm_password: String,
    pub business_model: BusinessModel,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate]
    pub personal_details: Option<PersonalDetails>,
    #[validate]
    pub business_information: Option<BusinessInformation>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PartnerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_model: BusinessModel,
    pub business_name: Option<String>,
    pub is_approved: bool,
    pub created_at: String,
}

impl From<Partner> for PartnerResponse {
    fn from(partner: Partner) -> Self {
        PartnerResponse {
            id: partner.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: partner.display_name(),
            phone: partner.contact_phone(),
            business_name: partner
                .business_information
                .as_ref()
                .map(|b| b.business_name.clone()),
            email: partner.email,
            business_model: partner.business_model,
            is_approved: partner.is_approved,
            created_at: millis_to_rfc3339(partner.created_at),
        }
    }
}

use mongodb::bson::oid::ObjectId;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::BusinessModel;

/// Which collection backs an account. Admin is a capability on top of
/// either role, never a role of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Normal,
    Partner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Partner => "partner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
    pub business_model: Option<BusinessModel>,
    /// Current owning partner, refreshed from the account document.
    pub partner_id: Option<ObjectId>,
}

impl Identity {
    pub fn is_partner(&self) -> bool {
        self.role == Role::Partner
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
    pub business_model: Option<BusinessModel>,
    pub partner_id: Option<String>,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        IdentityResponse {
            id: identity.id.to_hex(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            is_admin: identity.is_admin,
            business_model: identity.business_model,
            partner_id: identity.partner_id.map(|id| id.to_hex()),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginDto {
    pub email: String,
    pub password: String,
    /// Which account collection to sign in against.
    #[serde(default = "default_account_type")]
    pub account_type: Role,
}

fn default_account_type() -> Role {
    Role::Normal
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForgotPasswordDto {
    pub email: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordDto {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

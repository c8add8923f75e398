use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

use super::ApplicationResponse;

#[derive(Debug, Serialize, JsonSchema, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCounts {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PartnerAnalytics {
    pub total_clients: usize,
    pub applications: ApplicationCounts,
    /// Most recent first.
    pub recent_applications: Vec<ApplicationResponse>,
}

#[derive(Debug, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_users: u64,
    pub approved_partners: usize,
    pub pending_partners: usize,
    pub applications: ApplicationCounts,
}

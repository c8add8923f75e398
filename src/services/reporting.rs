//! Read-only listings. Every listing is the same cross-category query with a
//! different filter.

use indexmap::IndexMap;
use mongodb::bson::oid::ObjectId;

use super::relationships::partner_client_ids;
use super::{AppError, AppResult};
use crate::db::{ApplicationFilter, PartnerListFilter};
use crate::models::{
    AdminDashboard, Application, ApplicationCounts, ApplicationResponse, Identity,
    PartnerAnalytics, ServiceCategory,
};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archived {
    Include,
    Exclude,
}

/// Queries the three category collections in parallel, merges the results
/// and sorts them most recent first.
pub async fn cross_category(
    state: &AppState,
    filter: &ApplicationFilter,
    archived: Archived,
) -> AppResult<Vec<Application>> {
    let store = state.store();
    let (loans, ca_services, schemes) = tokio::join!(
        store.find_applications(ServiceCategory::Loan, filter),
        store.find_applications(ServiceCategory::CaService, filter),
        store.find_applications(ServiceCategory::GovernmentScheme, filter),
    );

    let mut merged = Vec::new();
    for batch in [loans, ca_services, schemes] {
        merged.extend(batch?);
    }
    finish(merged, archived)
}

fn finish(mut applications: Vec<Application>, archived: Archived) -> AppResult<Vec<Application>> {
    if archived == Archived::Exclude {
        applications.retain(|a| !a.is_archived());
    }
    applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(applications)
}

/// Union of several listings, keyed by id.
async fn union(
    state: &AppState,
    first: &ApplicationFilter,
    second: Option<&ApplicationFilter>,
    archived: Archived,
) -> AppResult<Vec<Application>> {
    let (a, b) = tokio::join!(cross_category(state, first, archived), async {
        match second {
            Some(filter) => cross_category(state, filter, archived).await,
            None => Ok(Vec::new()),
        }
    });

    let mut by_id: IndexMap<ObjectId, Application> = IndexMap::new();
    for app in a?.into_iter().chain(b?) {
        if let Some(id) = app.id {
            by_id.entry(id).or_insert(app);
        }
    }
    finish(by_id.into_values().collect(), archived)
}

fn counts(applications: &[Application]) -> ApplicationCounts {
    let mut counts = ApplicationCounts {
        total: applications.len(),
        ..Default::default()
    };
    for app in applications {
        let status = app
            .parsed_status()
            .map(|s| s.label().to_string())
            .unwrap_or_else(|| app.status.clone());
        *counts.by_status.entry(status).or_default() += 1;
        *counts
            .by_category
            .entry(app.service_category.as_str().to_string())
            .or_default() += 1;
    }
    counts
}

fn responses(applications: Vec<Application>) -> Vec<ApplicationResponse> {
    applications.into_iter().map(ApplicationResponse::from).collect()
}

pub async fn admin_applications(state: &AppState) -> AppResult<Vec<Application>> {
    cross_category(state, &ApplicationFilter::default(), Archived::Exclude).await
}

pub async fn partner_applications(state: &AppState, partner_id: ObjectId) -> AppResult<Vec<Application>> {
    cross_category(state, &ApplicationFilter::submitted_by(partner_id), Archived::Exclude).await
}

/// Admin view of one client's history, archived records included.
pub async fn client_applications(state: &AppState, client_id: ObjectId) -> AppResult<Vec<Application>> {
    if state.store().find_user(client_id).await?.is_none() {
        return Err(AppError::NotFound("Client"));
    }
    cross_category(state, &ApplicationFilter::applicant(client_id), Archived::Include).await
}

pub async fn partner_client_applications(
    state: &AppState,
    partner: &Identity,
    client_id: ObjectId,
) -> AppResult<Vec<Application>> {
    if !partner_client_ids(state, partner.id).await?.contains(&client_id) {
        return Err(AppError::Forbidden);
    }
    cross_category(state, &ApplicationFilter::applicant(client_id), Archived::Exclude).await
}

/// Everything the caller submitted or is the applicant of.
pub async fn my_applications(state: &AppState, caller: &Identity) -> AppResult<Vec<Application>> {
    union(
        state,
        &ApplicationFilter::submitted_by(caller.id),
        Some(&ApplicationFilter::applicant(caller.id)),
        Archived::Exclude,
    )
    .await
}

pub async fn partner_analytics(state: &AppState, partner: &Identity) -> AppResult<PartnerAnalytics> {
    let clients: Vec<ObjectId> = partner_client_ids(state, partner.id).await?.into_iter().collect();
    let total_clients = clients.len();

    let by_clients = (!clients.is_empty()).then(|| ApplicationFilter::applicants(clients));
    let applications = union(
        state,
        &ApplicationFilter::submitted_by(partner.id),
        by_clients.as_ref(),
        Archived::Exclude,
    )
    .await?;

    Ok(PartnerAnalytics {
        total_clients,
        applications: counts(&applications),
        recent_applications: responses(applications),
    })
}

pub async fn admin_dashboard(state: &AppState) -> AppResult<AdminDashboard> {
    let store = state.store();
    let (users, partners, applications) = tokio::join!(
        store.count_users(),
        store.list_partners(PartnerListFilter::default()),
        admin_applications(state),
    );

    let partners = partners?;
    let approved_partners = partners.iter().filter(|p| p.is_approved).count();

    Ok(AdminDashboard {
        total_users: users?,
        approved_partners,
        pending_partners: partners.len() - approved_partners,
        applications: counts(&applications?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{partner_identity, sample_form, user_identity, TestEnv};

    #[tokio::test]
    async fn admin_listing_excludes_archived_most_recent_first() {
        let env = TestEnv::new();
        let user = env.user("asha@example.com", None).await;
        let me = user_identity(&user);
        let older = env
            .application(ServiceCategory::Loan, &user, &me, "Submitted", 1_000, sample_form())
            .await;
        let newer = env
            .application(ServiceCategory::CaService, &user, &me, "Approved", 2_000, sample_form())
            .await;
        env.application(ServiceCategory::GovernmentScheme, &user, &me, "Archived", 3_000, sample_form())
            .await;

        let listed = admin_applications(&env.state).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn partner_client_view_is_restricted_to_own_clients() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let other = env.partner("rival@finserv.in", true).await;
        let mine = env.user("a@example.com", partner.id).await;
        let theirs = env.user("b@example.com", other.id).await;
        let agent = partner_identity(&partner);

        env.application(ServiceCategory::Loan, &mine, &user_identity(&mine), "Submitted", 1_000, sample_form())
            .await;

        let listed = partner_client_applications(&env.state, &agent, mine.id.unwrap()).await.unwrap();
        assert_eq!(listed.len(), 1);

        let denied = partner_client_applications(&env.state, &agent, theirs.id.unwrap()).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn analytics_deduplicate_and_count() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let client = env.user("a@example.com", partner.id).await;
        let walk_in = env.user("b@example.com", None).await;
        let agent = partner_identity(&partner);

        // submitted by the partner for its own client: matches both queries
        env.application(ServiceCategory::Loan, &client, &agent, "Submitted", 1_000, sample_form())
            .await;
        env.application(ServiceCategory::CaService, &client, &user_identity(&client), "Approved", 2_000, sample_form())
            .await;
        env.application(ServiceCategory::Loan, &walk_in, &agent, "In Review", 3_000, sample_form())
            .await;
        env.application(ServiceCategory::Loan, &client, &agent, "Archived", 4_000, sample_form())
            .await;

        let analytics = partner_analytics(&env.state, &agent).await.unwrap();
        assert_eq!(analytics.total_clients, 1);
        assert_eq!(analytics.applications.total, 3);
        assert_eq!(analytics.applications.by_status.get("Submitted"), Some(&1));
        assert_eq!(analytics.applications.by_status.get("In Review"), Some(&1));
        assert_eq!(analytics.applications.by_category.get("loan"), Some(&2));
        assert_eq!(analytics.applications.by_category.get("caService"), Some(&1));
        assert_eq!(analytics.recent_applications[0].status, "In Review");
    }

    #[tokio::test]
    async fn mine_covers_submitted_and_applicant_records_once() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let user = env.user("asha@example.com", partner.id).await;
        let me = user_identity(&user);

        env.application(ServiceCategory::Loan, &user, &me, "Submitted", 1_000, sample_form())
            .await;
        env.application(ServiceCategory::Loan, &user, &partner_identity(&partner), "Submitted", 2_000, sample_form())
            .await;

        let mine = my_applications(&env.state, &me).await.unwrap();
        assert_eq!(mine.len(), 2);
    }

    #[tokio::test]
    async fn dashboard_totals() {
        let env = TestEnv::new();
        env.admin().await;
        let partner = env.partner("agent@finserv.in", true).await;
        env.partner("pending@finserv.in", false).await;
        let user = env.user("asha@example.com", partner.id).await;
        let me = user_identity(&user);
        env.application(ServiceCategory::Loan, &user, &me, "Submitted", 1_000, sample_form())
            .await;
        env.application(ServiceCategory::Loan, &user, &me, "Archived", 2_000, sample_form())
            .await;

        let dashboard = admin_dashboard(&env.state).await.unwrap();
        assert_eq!(dashboard.total_users, 1);
        assert_eq!(dashboard.approved_partners, 1);
        assert_eq!(dashboard.pending_partners, 1);
        assert_eq!(dashboard.applications.total, 1);
    }
}

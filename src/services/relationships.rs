//! Who owns which client, and the admin operations that change it.

use indexmap::IndexSet;
use log::info;
use mongodb::bson::oid::ObjectId;

use super::{notifications, outbox, storage, AppError, AppResult};
use crate::db::PartnerListFilter;
use crate::models::{Identity, Partner, SideEffect, User};
use crate::state::AppState;

pub async fn approve_partner(state: &AppState, partner_id: ObjectId) -> AppResult<Partner> {
    let store = state.store();
    let mut partner = store
        .find_partner(partner_id)
        .await?
        .ok_or(AppError::NotFound("Partner"))?;

    if !store.set_partner_approval(partner_id, true).await? {
        return Err(AppError::NotFound("Partner"));
    }
    partner.is_approved = true;
    info!("Partner {} approved", partner_id);

    let login_url = format!("{}/login", state.settings.public_base_url.trim_end_matches('/'));
    let mail = notifications::partner_approved(&partner.email, &partner.display_name(), &login_url);
    outbox::dispatch(state, SideEffect::Email(mail)).await;

    Ok(partner)
}

/// Un-approves the partner and releases all of its clients in one batch.
pub async fn remove_partner(state: &AppState, partner_id: ObjectId) -> AppResult<u64> {
    let store = state.store();
    let partner = store
        .find_partner(partner_id)
        .await?
        .ok_or(AppError::NotFound("Partner"))?;
    if partner.is_admin {
        return Err(AppError::Forbidden);
    }

    let released = store.deactivate_partner(partner_id).await?;
    info!("Partner {} removed, {} client(s) released", partner_id, released);
    Ok(released)
}

pub async fn partner_client_ids(state: &AppState, partner_id: ObjectId) -> AppResult<IndexSet<ObjectId>> {
    let clients = state.store().list_users_by_partner(partner_id).await?;
    Ok(clients.into_iter().filter_map(|c| c.id).collect())
}

/// A partner drops one of its own clients.
pub async fn disassociate_client(state: &AppState, partner: &Identity, client_id: ObjectId) -> AppResult<()> {
    let owned = partner_client_ids(state, partner.id).await?;
    if !owned.contains(&client_id) {
        return Err(AppError::Forbidden);
    }

    if !state.store().set_user_partner(client_id, None).await? {
        return Err(AppError::NotFound("Client"));
    }
    info!("Partner {} released client {}", partner.id, client_id);
    Ok(())
}

pub async fn reassign_client(state: &AppState, client_id: ObjectId, partner_id: ObjectId) -> AppResult<User> {
    let store = state.store();
    let mut client = store
        .find_user(client_id)
        .await?
        .ok_or(AppError::NotFound("Client"))?;
    let partner = store
        .find_partner(partner_id)
        .await?
        .ok_or(AppError::NotFound("Partner"))?;
    if partner.is_admin {
        return Err(AppError::field("partnerId", "Clients cannot be assigned to an admin account"));
    }

    if !store.set_user_partner(client_id, Some(partner_id)).await? {
        return Err(AppError::NotFound("Client"));
    }
    client.partner_id = Some(partner_id);
    info!("Client {} reassigned to partner {}", client_id, partner_id);
    Ok(client)
}

/// Irreversible. The user and all of their applications go in one batch;
/// stored files are cleaned up only after it commits.
pub async fn delete_client(state: &AppState, client_id: ObjectId) -> AppResult<usize> {
    let store = state.store();
    if store.find_user(client_id).await?.is_none() {
        return Err(AppError::NotFound("Client"));
    }

    let deleted = store.delete_client(client_id).await?;
    info!("Client {} deleted with {} application(s)", client_id, deleted.len());

    let mut urls = IndexSet::new();
    for application in &deleted {
        urls.extend(storage::collect_storage_urls(&application.form_data, state.files.as_ref()));
    }
    if !urls.is_empty() {
        outbox::dispatch(state, SideEffect::DeleteFiles { urls: urls.into_iter().collect() }).await;
    }

    Ok(deleted.len())
}

pub async fn list_partners(state: &AppState, approved: Option<bool>) -> AppResult<Vec<Partner>> {
    let mut partners = state.store().list_partners(PartnerListFilter { approved }).await?;
    partners.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(partners)
}

pub async fn list_clients(state: &AppState) -> AppResult<Vec<User>> {
    let mut users = state.store().list_users().await?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(users)
}

pub async fn partner_clients(state: &AppState, partner: &Identity) -> AppResult<Vec<User>> {
    let mut users = state.store().list_users_by_partner(partner.id).await?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::models::{Role, ServiceCategory};
    use crate::services::accounts::login;
    use crate::services::testing::{partner_identity, sample_form, user_identity, TestEnv, PASSWORD};
    use serde_json::json;

    #[tokio::test]
    async fn approval_unlocks_login_and_sends_mail() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", false).await;
        let id = partner.id.unwrap();

        assert!(login(&env.state, "agent@finserv.in", PASSWORD, Role::Partner).await.is_err());
        let approved = approve_partner(&env.state, id).await.unwrap();
        assert!(approved.is_approved);
        assert!(login(&env.state, "agent@finserv.in", PASSWORD, Role::Partner).await.is_ok());

        let mail = env.mailer.sent_to("agent@finserv.in");
        assert_eq!(mail.len(), 1);
        assert!(mail[0].html.contains("http://localhost:8000/login"));
    }

    #[tokio::test]
    async fn approving_unknown_partner_is_not_found() {
        let env = TestEnv::new();
        let outcome = approve_partner(&env.state, ObjectId::new()).await;
        assert!(matches!(outcome, Err(AppError::NotFound("Partner"))));
    }

    #[tokio::test]
    async fn removal_cascades_to_every_client() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let pid = partner.id.unwrap();
        let a = env.user("a@example.com", Some(pid)).await;
        let b = env.user("b@example.com", Some(pid)).await;
        let other = env.partner("rival@finserv.in", true).await;
        let c = env.user("c@example.com", other.id).await;

        let released = remove_partner(&env.state, pid).await.unwrap();
        assert_eq!(released, 2);

        let store = env.state.store();
        assert!(!store.find_partner(pid).await.unwrap().unwrap().is_approved);
        for user in [&a, &b] {
            let reread = store.find_user(user.id.unwrap()).await.unwrap().unwrap();
            assert_eq!(reread.partner_id, None);
        }
        let untouched = store.find_user(c.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(untouched.partner_id, other.id);
    }

    #[tokio::test]
    async fn partner_can_only_release_its_own_clients() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let other = env.partner("rival@finserv.in", true).await;
        let mine = env.user("a@example.com", partner.id).await;
        let theirs = env.user("b@example.com", other.id).await;
        let agent = partner_identity(&partner);

        let denied = disassociate_client(&env.state, &agent, theirs.id.unwrap()).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));
        let still = env.store.find_user(theirs.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(still.partner_id, other.id);

        disassociate_client(&env.state, &agent, mine.id.unwrap()).await.unwrap();
        let released = env.store.find_user(mine.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(released.partner_id, None);
    }

    #[tokio::test]
    async fn reassignment_writes_exactly_the_target() {
        let env = TestEnv::new();
        let from = env.partner("agent@finserv.in", true).await;
        let to = env.partner("rival@finserv.in", true).await;
        let admin = env.admin().await;
        let client = env.user("a@example.com", from.id).await;

        let moved = reassign_client(&env.state, client.id.unwrap(), to.id.unwrap()).await.unwrap();
        assert_eq!(moved.partner_id, to.id);
        let reread = env.store.find_user(client.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(reread.partner_id, to.id);

        let to_admin = reassign_client(&env.state, client.id.unwrap(), admin.id.unwrap()).await;
        assert!(matches!(to_admin, Err(AppError::Validation(_))));
        let missing = reassign_client(&env.state, client.id.unwrap(), ObjectId::new()).await;
        assert!(matches!(missing, Err(AppError::NotFound("Partner"))));
    }

    #[tokio::test]
    async fn client_deletion_removes_everything_then_files() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let client = env.user("a@example.com", partner.id).await;
        let bystander = env.user("b@example.com", partner.id).await;
        let agent = partner_identity(&partner);

        let loan = env
            .application(
                ServiceCategory::Loan,
                &client,
                &agent,
                "Submitted",
                1_000,
                json!({ "pan": "http://localhost:8000/uploads/pan.pdf" }),
            )
            .await;
        let scheme = env
            .application(
                ServiceCategory::GovernmentScheme,
                &client,
                &user_identity(&client),
                "Archived",
                2_000,
                json!({ "photo": "http://localhost:8000/uploads/photo.png", "pan": "http://localhost:8000/uploads/pan.pdf", "site": "https://cdn.example.org/logo.png" }),
            )
            .await;
        let kept = env
            .application(ServiceCategory::Loan, &bystander, &agent, "Submitted", 3_000, sample_form())
            .await;

        let removed = delete_client(&env.state, client.id.unwrap()).await.unwrap();
        assert_eq!(removed, 2);

        let store = env.state.store();
        assert!(store.find_user(client.id.unwrap()).await.unwrap().is_none());
        assert!(store.find_application(ServiceCategory::Loan, loan.id.unwrap()).await.unwrap().is_none());
        assert!(store
            .find_application(ServiceCategory::GovernmentScheme, scheme.id.unwrap())
            .await
            .unwrap()
            .is_none());
        assert!(store.find_application(ServiceCategory::Loan, kept.id.unwrap()).await.unwrap().is_some());

        let mut deleted = env.files.deleted();
        deleted.sort();
        assert_eq!(
            deleted,
            vec![
                "http://localhost:8000/uploads/pan.pdf".to_string(),
                "http://localhost:8000/uploads/photo.png".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn admins_never_appear_in_partner_listings() {
        let env = TestEnv::new();
        env.admin().await;
        env.partner("agent@finserv.in", true).await;
        env.partner("pending@finserv.in", false).await;

        let all = list_partners(&env.state, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|p| !p.is_admin));

        let pending = list_partners(&env.state, Some(false)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].email, "pending@finserv.in");
    }
}

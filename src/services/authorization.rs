//! The three predicates every sensitive operation funnels through.

use mongodb::bson::oid::ObjectId;

use super::{AppError, AppResult};
use crate::db::Store;
use crate::models::{Application, Identity, ServiceCategory};

pub fn verify_admin(identity: Option<&Identity>) -> AppResult<&Identity> {
    let identity = identity.ok_or(AppError::Unauthorized)?;
    if !identity.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(identity)
}

pub fn verify_partner(identity: Option<&Identity>) -> AppResult<&Identity> {
    let identity = identity.ok_or(AppError::Unauthorized)?;
    if !identity.is_partner() {
        return Err(AppError::Forbidden);
    }
    Ok(identity)
}

/// Loads the application and returns it only to an admin, its submitter, or
/// its applicant.
pub async fn verify_application_permission(
    store: &dyn Store,
    identity: Option<&Identity>,
    id: ObjectId,
    category: ServiceCategory,
) -> AppResult<Application> {
    let identity = identity.ok_or(AppError::Unauthorized)?;

    let application = store
        .find_application(category, id)
        .await?
        .ok_or(AppError::NotFound("Application"))?;

    if can_access(identity, &application) {
        Ok(application)
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn can_access(identity: &Identity, application: &Application) -> bool {
    identity.is_admin
        || application.submitted_by.user_id == identity.id
        || application.applicant_details.user_id == Some(identity.id)
}

pub fn parse_id(raw: &str, what: &'static str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::NotFound(what))
}

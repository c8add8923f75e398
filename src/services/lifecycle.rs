//! Submission, edits, status changes and archival of applications.

use log::info;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;

use super::authorization::{parse_id, verify_application_permission};
use super::{notifications, outbox, storage, AppError, AppResult};
use crate::models::{
    ApplicantDetails, Application, ApplicationStatus, Identity, ServiceCategory, SideEffect,
    SubmitApplicationDto, SubmittedBy,
};
use crate::state::AppState;
use crate::utils::{normalize_email, push_error, validate_email, validate_form_data, FieldErrors};

fn check_form(form_data: &Value, errors: &mut FieldErrors) {
    for (field, messages) in validate_form_data(form_data) {
        for message in messages {
            push_error(errors, field.clone(), message);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn applicant_for(
    state: &AppState,
    caller: &Identity,
    dto: &SubmitApplicationDto,
    errors: &mut FieldErrors,
) -> AppResult<ApplicantDetails> {
    if !caller.is_partner() {
        return Ok(ApplicantDetails {
            name: caller.name.clone(),
            email: Some(caller.email.clone()),
            user_id: Some(caller.id),
        });
    }

    let client = match non_empty(dto.client_id.clone()) {
        Some(raw) => {
            let client_id = parse_id(&raw, "Client")?;
            let client = state
                .store()
                .find_user(client_id)
                .await?
                .ok_or(AppError::NotFound("Client"))?;
            if client.partner_id != Some(caller.id) {
                return Err(AppError::Forbidden);
            }
            Some(client)
        }
        None => None,
    };

    let name = non_empty(dto.applicant_name.clone())
        .or_else(|| client.as_ref().map(|c| c.full_name.clone()));
    let email = non_empty(dto.applicant_email.clone())
        .map(|e| normalize_email(&e))
        .or_else(|| client.as_ref().map(|c| c.email.clone()));

    if name.is_none() {
        push_error(errors, "applicantName", "Applicant name is required");
    }
    match email.as_deref() {
        None => push_error(errors, "applicantEmail", "Applicant email is required"),
        Some(e) if !validate_email(e) => push_error(errors, "applicantEmail", "Invalid email address"),
        Some(_) => {}
    }

    Ok(ApplicantDetails {
        name: name.unwrap_or_default(),
        email,
        user_id: client.and_then(|c| c.id),
    })
}

pub async fn submit_application(
    state: &AppState,
    caller: &Identity,
    category: ServiceCategory,
    dto: SubmitApplicationDto,
) -> AppResult<ObjectId> {
    let mut errors = FieldErrors::new();
    if dto.application_type.trim().is_empty() {
        push_error(&mut errors, "applicationType", "Application type is required");
    }
    check_form(&dto.form_data, &mut errors);
    let applicant = applicant_for(state, caller, &dto, &mut errors).await?;
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let now = DateTime::now();
    let application = Application {
        id: None,
        application_type: dto.application_type.trim().to_string(),
        service_category: category,
        status: ApplicationStatus::Submitted.label().to_string(),
        form_data: dto.form_data,
        applicant_details: applicant,
        submitted_by: SubmittedBy {
            user_id: caller.id,
            name: caller.name.clone(),
            email: caller.email.clone(),
            role: caller.role,
        },
        partner_id: caller.is_partner().then_some(caller.id),
        created_at: now,
        updated_at: now,
    };

    let id = state.store().insert_application(&application).await?;
    info!("{} application {} submitted by {}", category, id, caller.id);

    if let Some(email) = application.applicant_details.email.as_deref() {
        let mail = notifications::application_received(
            email,
            &application.applicant_details.name,
            &application.application_type,
        );
        outbox::dispatch(state, SideEffect::Email(mail)).await;
    }
    if let Some(admin) = state.settings.admin_email.as_deref() {
        let mail = notifications::admin_new_application(
            admin,
            &application.application_type,
            &application.applicant_details.name,
            &caller.name,
        );
        outbox::dispatch(state, SideEffect::Email(mail)).await;
    }

    Ok(id)
}

pub async fn get_application(
    state: &AppState,
    caller: Option<&Identity>,
    category: ServiceCategory,
    id: ObjectId,
) -> AppResult<Application> {
    verify_application_permission(state.store(), caller, id, category).await
}

/// Replaces `formData` wholesale. Archived applications are read-only.
pub async fn update_application(
    state: &AppState,
    caller: Option<&Identity>,
    category: ServiceCategory,
    id: ObjectId,
    form_data: Value,
) -> AppResult<Application> {
    let mut application = verify_application_permission(state.store(), caller, id, category).await?;
    if application.is_terminal() {
        return Err(AppError::field("status", "Archived applications cannot be edited"));
    }

    let mut errors = FieldErrors::new();
    check_form(&form_data, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let now = DateTime::now();
    if !state.store().replace_form_data(category, id, &form_data, now).await? {
        return Err(AppError::NotFound("Application"));
    }

    application.form_data = form_data;
    application.updated_at = now;
    Ok(application)
}

pub async fn update_status(
    state: &AppState,
    caller: Option<&Identity>,
    category: ServiceCategory,
    id: ObjectId,
    raw_status: &str,
) -> AppResult<Application> {
    let mut application = verify_application_permission(state.store(), caller, id, category).await?;

    let next = ApplicationStatus::parse(raw_status)
        .ok_or_else(|| AppError::field("status", format!("Unknown status \"{}\"", raw_status.trim())))?;

    if next.is_terminal() {
        return archive_loaded(state, application, category, id).await;
    }

    let current = application.parsed_status();
    match current {
        Some(from) if !from.can_transition_to(next) => {
            return Err(AppError::field(
                "status",
                format!("Cannot change status from {} to {}", from, next),
            ));
        }
        // unknown legacy labels may move to any non-terminal status
        _ => {}
    }

    let now = DateTime::now();
    if !state.store().set_application_status(category, id, next.label(), now).await? {
        return Err(AppError::NotFound("Application"));
    }

    application.status = next.label().to_string();
    application.updated_at = now;

    if current != Some(next) {
        info!("{} application {} moved to {}", category, id, next);
        if let Some(email) = application.applicant_details.email.as_deref() {
            let mail = notifications::status_changed(
                email,
                &application.applicant_details.name,
                &application.application_type,
                next.label(),
            );
            outbox::dispatch(state, SideEffect::Email(mail)).await;
        }
    }

    Ok(application)
}

/// Soft delete: the document stays, its uploaded files go. File cleanup runs
/// after the status write and never fails the call.
pub async fn archive_application(
    state: &AppState,
    caller: Option<&Identity>,
    category: ServiceCategory,
    id: ObjectId,
) -> AppResult<Application> {
    let application = verify_application_permission(state.store(), caller, id, category).await?;
    archive_loaded(state, application, category, id).await
}

async fn archive_loaded(
    state: &AppState,
    mut application: Application,
    category: ServiceCategory,
    id: ObjectId,
) -> AppResult<Application> {
    if application.is_terminal() {
        return Ok(application);
    }

    let urls = storage::collect_storage_urls(&application.form_data, state.files.as_ref());

    let now = DateTime::now();
    let label = ApplicationStatus::Archived.label();
    if !state.store().set_application_status(category, id, label, now).await? {
        return Err(AppError::NotFound("Application"));
    }
    application.status = label.to_string();
    application.updated_at = now;
    info!("{} application {} archived ({} file(s) to remove)", category, id, urls.len());

    if !urls.is_empty() {
        outbox::dispatch(state, SideEffect::DeleteFiles { urls }).await;
    }

    Ok(application)
}

use hmac::{Hmac, Mac};
use log::{info, warn};
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::Rng;
use sha2::Sha256;
use validator::Validate;

use super::{notifications, outbox, AppError, AppResult};
use crate::db::AccountRef;
use crate::models::{
    Identity, Partner, ResetPasswordDto, Role, SideEffect, SignUpPartnerDto, SignUpUserDto, User,
};
use crate::state::AppState;
use crate::utils::{field_errors, normalize_email, push_error, validate_mobile, FieldErrors};

type HmacSha256 = Hmac<Sha256>;

pub const INVALID_LOGIN: &str = "Invalid email or password";
pub const INVALID_RESET: &str = "Invalid or expired reset token";
pub const RESET_REQUESTED: &str =
    "If an account exists for that email, a password reset link has been sent.";

const RESET_TTL_MS: i64 = 60 * 60 * 1000;
const MIN_PASSWORD: usize = 8;

fn identity_for_user(user: &User, id: ObjectId) -> Identity {
    Identity {
        id,
        name: user.full_name.clone(),
        email: user.email.clone(),
        role: Role::Normal,
        is_admin: user.is_admin(),
        business_model: None,
        partner_id: user.partner_id,
    }
}

fn identity_for_partner(partner: &Partner, id: ObjectId) -> Identity {
    Identity {
        id,
        name: partner.display_name(),
        email: partner.email.clone(),
        role: Role::Partner,
        is_admin: partner.is_admin,
        business_model: Some(partner.business_model),
        partner_id: None,
    }
}

fn check_confirmation(password: &str, confirm: &str, errors: &mut FieldErrors) {
    if password != confirm {
        push_error(errors, "confirmPassword", "Passwords do not match");
    }
}

fn check_phone(field: &str, phone: Option<&str>, errors: &mut FieldErrors) {
    if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
        if !validate_mobile(phone) {
            push_error(errors, field, "Invalid mobile number");
        }
    }
}

fn validation_errors<T: Validate>(dto: &T) -> FieldErrors {
    dto.validate().err().map(|e| field_errors(&e)).unwrap_or_default()
}

fn hash_password(state: &AppState, password: &str) -> AppResult<String> {
    Ok(bcrypt::hash(password, state.settings.bcrypt_cost)?)
}

fn password_matches(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            warn!("Stored password hash could not be checked: {}", e);
            false
        }
    }
}

/// Registers a client. Without an explicit partner the configured house
/// account becomes the owner, if there is one.
pub async fn sign_up_user(state: &AppState, dto: SignUpUserDto) -> AppResult<Identity> {
    let store = state.store();
    let mut errors = validation_errors(&dto);
    check_confirmation(&dto.password, &dto.confirm_password, &mut errors);
    check_phone("phone", dto.phone.as_deref(), &mut errors);

    let explicit_partner = match dto.partner_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                push_error(&mut errors, "partnerId", "Selected partner is not available");
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let email = normalize_email(&dto.email);
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::field("email", "An account with this email already exists"));
    }

    let house = state.settings.house_account_partner_id;
    let (partner_id, notify_partner) = match explicit_partner {
        Some(id) => match store.find_partner(id).await? {
            Some(partner) if partner.is_approved && !partner.is_admin => {
                let notify = (Some(id) != house).then_some(partner);
                (Some(id), notify)
            }
            _ => return Err(AppError::field("partnerId", "Selected partner is not available")),
        },
        None => (house, None),
    };

    let now = DateTime::now();
    let user = User {
        id: None,
        full_name: dto.full_name.trim().to_string(),
        email,
        password: hash_password(state, &dto.password)?,
        phone: dto.phone.filter(|p| !p.trim().is_empty()),
        partner_id,
        is_admin: None,
        reset_token: None,
        reset_token_expiry: None,
        created_at: now,
        updated_at: now,
    };

    let id = store.insert_user(&user).await?;
    info!("User {} signed up (partner: {:?})", id, partner_id);

    if let Some(partner) = notify_partner {
        let mail = notifications::new_client_for_partner(
            &partner.email,
            &partner.display_name(),
            &user.full_name,
            &user.email,
        );
        outbox::dispatch(state, SideEffect::Email(mail)).await;
    }
    outbox::dispatch(
        state,
        SideEffect::Email(notifications::welcome_user(&user.email, &user.full_name)),
    )
    .await;

    Ok(identity_for_user(&user, id))
}

/// Registers a partner. Partners start unapproved and cannot sign in until
/// an admin approves them.
pub async fn sign_up_partner(state: &AppState, dto: SignUpPartnerDto) -> AppResult<Identity> {
    let store = state.store();
    let mut errors = validation_errors(&dto);
    check_confirmation(&dto.password, &dto.confirm_password, &mut errors);
    check_phone("phone", dto.phone.as_deref(), &mut errors);
    check_phone(
        "personalDetails.phone",
        dto.personal_details.as_ref().and_then(|p| p.phone.as_deref()),
        &mut errors,
    );

    if dto.business_model.requires_business_profile() {
        if dto.personal_details.is_none() {
            push_error(&mut errors, "personalDetails", "Personal details are required");
        }
        if dto.business_information.is_none() {
            push_error(&mut errors, "businessInformation", "Business information is required");
        }
    } else if dto.full_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        push_error(&mut errors, "fullName", "Full name is required");
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let email = normalize_email(&dto.email);
    if store.find_partner_by_email(&email).await?.is_some() {
        return Err(AppError::field("email", "An account with this email already exists"));
    }

    let now = DateTime::now();
    let partner = Partner {
        id: None,
        email,
        password: hash_password(state, &dto.password)?,
        business_model: dto.business_model,
        full_name: dto.full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        phone: dto.phone.filter(|p| !p.trim().is_empty()),
        personal_details: dto.personal_details,
        business_information: dto.business_information,
        is_approved: false,
        is_admin: false,
        reset_token: None,
        reset_token_expiry: None,
        created_at: now,
        updated_at: now,
    };

    let id = store.insert_partner(&partner).await?;
    info!("Partner {} registered as {}", id, partner.business_model);

    let name = partner.display_name();
    outbox::dispatch(
        state,
        SideEffect::Email(notifications::partner_application_received(&partner.email, &name)),
    )
    .await;
    if let Some(admin) = state.settings.admin_email.as_deref() {
        let mail = notifications::admin_new_partner(
            admin,
            &name,
            &partner.email,
            partner.business_model.as_str(),
        );
        outbox::dispatch(state, SideEffect::Email(mail)).await;
    }

    Ok(identity_for_partner(&partner, id))
}

/// Every failure collapses to the same message.
pub async fn login(state: &AppState, email: &str, password: &str, role: Role) -> AppResult<Identity> {
    let store = state.store();
    let email = normalize_email(email);
    let invalid = || AppError::InvalidCredentials(INVALID_LOGIN);

    match role {
        Role::Normal => {
            let user = store.find_user_by_email(&email).await?.ok_or_else(invalid)?;
            let id = user.id.ok_or_else(invalid)?;
            if !password_matches(password, &user.password) {
                return Err(invalid());
            }
            Ok(identity_for_user(&user, id))
        }
        Role::Partner => {
            let partner = store.find_partner_by_email(&email).await?.ok_or_else(invalid)?;
            let id = partner.id.ok_or_else(invalid)?;
            if !password_matches(password, &partner.password) || !partner.is_approved {
                return Err(invalid());
            }
            Ok(identity_for_partner(&partner, id))
        }
    }
}

pub fn reset_token_digest(secret: &str, token: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Unexpected(format!("reset token key: {}", e)))?;
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Succeeds identically whether or not the email belongs to an account.
pub async fn request_password_reset(state: &AppState, email: &str) -> AppResult<()> {
    let store = state.store();
    let email = normalize_email(email);

    let account = match store.find_user_by_email(&email).await? {
        Some(user) => user.id.map(AccountRef::User),
        None => store
            .find_partner_by_email(&email)
            .await?
            .and_then(|p| p.id.map(AccountRef::Partner)),
    };

    let Some(account) = account else {
        info!("Password reset requested for unknown email");
        return Ok(());
    };

    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    let token = hex::encode(bytes);
    let digest = reset_token_digest(&state.settings.session_secret, &token)?;
    let expires_at = DateTime::from_millis(DateTime::now().timestamp_millis() + RESET_TTL_MS);

    store.set_reset_token(account, &digest, expires_at).await?;

    let link = state.settings.reset_link(&token);
    outbox::dispatch(state, SideEffect::Email(notifications::password_reset(&email, &link))).await;
    Ok(())
}

pub async fn complete_password_reset(state: &AppState, dto: ResetPasswordDto) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if dto.password.chars().count() < MIN_PASSWORD {
        push_error(&mut errors, "password", "Password must be at least 8 characters");
    }
    check_confirmation(&dto.password, &dto.confirm_password, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let store = state.store();
    let digest = reset_token_digest(&state.settings.session_secret, dto.token.trim())?;
    let target = store
        .find_by_reset_token(&digest)
        .await?
        .ok_or(AppError::InvalidCredentials(INVALID_RESET))?;

    let still_valid = target
        .expires_at
        .is_some_and(|at| at.timestamp_millis() > DateTime::now().timestamp_millis());
    if !still_valid {
        return Err(AppError::InvalidCredentials(INVALID_RESET));
    }

    let hash = hash_password(state, &dto.password)?;
    store.update_password(target.account, &hash).await?;
    info!("Password reset completed for a {} account", target.account.role());
    Ok(())
}

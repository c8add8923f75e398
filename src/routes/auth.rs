use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::OptionalSession;
use crate::models::{
    ForgotPasswordDto, Identity, IdentityResponse, LoginDto, ResetPasswordDto, SignUpPartnerDto,
    SignUpUserDto,
};
use crate::services::{accounts, session, AppError};
use crate::state::AppState;
use crate::utils::{ApiError, ApiResponse};

fn start_session(jar: &CookieJar<'_>, identity: &Identity, state: &AppState) -> Result<(), ApiError> {
    session::write_cookies(jar, identity, &state.settings)
        .map_err(|e| ApiError::from(AppError::Unexpected(format!("session token: {}", e))))
}

/// --------------------
/// Sign up (client)
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/signup/user", data = "<dto>")]
pub async fn sign_up_user(
    state: &State<AppState>,
    jar: &CookieJar<'_>,
    dto: Json<SignUpUserDto>,
) -> Result<Json<ApiResponse<IdentityResponse>>, ApiError> {
    let identity = accounts::sign_up_user(state.inner(), dto.into_inner()).await?;
    start_session(jar, &identity, state.inner())?;

    Ok(Json(ApiResponse::success_with_message(
        "Account created successfully",
        IdentityResponse::from(&identity),
    )))
}

/// --------------------
/// Sign up (partner)
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/signup/partner", data = "<dto>")]
pub async fn sign_up_partner(
    state: &State<AppState>,
    dto: Json<SignUpPartnerDto>,
) -> Result<Json<ApiResponse<IdentityResponse>>, ApiError> {
    let identity = accounts::sign_up_partner(state.inner(), dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Registration received. You can sign in once your account is approved.",
        IdentityResponse::from(&identity),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    state: &State<AppState>,
    jar: &CookieJar<'_>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<IdentityResponse>>, ApiError> {
    let dto = dto.into_inner();
    let identity = accounts::login(state.inner(), &dto.email, &dto.password, dto.account_type).await?;
    start_session(jar, &identity, state.inner())?;

    Ok(Json(ApiResponse::success_with_message(
        "Login successful",
        IdentityResponse::from(&identity),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/logout")]
pub fn logout(jar: &CookieJar<'_>) -> Json<ApiResponse<()>> {
    session::clear_cookies(jar);
    Json(ApiResponse::message("Logged out"))
}

#[openapi(tag = "Auth")]
#[get("/auth/session")]
pub fn check_session(session: OptionalSession) -> Result<Json<ApiResponse<IdentityResponse>>, ApiError> {
    match session.0 {
        Some(identity) => Ok(Json(ApiResponse::success(IdentityResponse::from(&identity)))),
        None => Err(ApiError::unauthorized("Not signed in")),
    }
}

/// --------------------
/// Password reset
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/password/forgot", data = "<dto>")]
pub async fn forgot_password(
    state: &State<AppState>,
    dto: Json<ForgotPasswordDto>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    accounts::request_password_reset(state.inner(), &dto.email).await?;
    Ok(Json(ApiResponse::message(accounts::RESET_REQUESTED)))
}

#[openapi(tag = "Auth")]
#[post("/auth/password/reset", data = "<dto>")]
pub async fn reset_password(
    state: &State<AppState>,
    dto: Json<ResetPasswordDto>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    accounts::complete_password_reset(state.inner(), dto.into_inner()).await?;
    Ok(Json(ApiResponse::message("Password updated. You can now sign in.")))
}

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::guards::SessionGuard;
use crate::models::{
    ApplicationResponse, ServiceCategory, SubmitApplicationDto, UpdateApplicationDto,
    UpdateStatusDto,
};
use crate::services::authorization::parse_id;
use crate::services::{lifecycle, reporting};
use crate::state::AppState;
use crate::utils::{ApiError, ApiResponse};

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedApplication {
    pub application_id: String,
}

#[openapi(tag = "Applications")]
#[post("/applications/<category>", data = "<dto>")]
pub async fn submit_application(
    state: &State<AppState>,
    session: SessionGuard,
    category: ServiceCategory,
    dto: Json<SubmitApplicationDto>,
) -> Result<Json<ApiResponse<SubmittedApplication>>, ApiError> {
    let id = lifecycle::submit_application(state.inner(), &session.0, category, dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Application submitted successfully",
        SubmittedApplication { application_id: id.to_hex() },
    )))
}

#[openapi(tag = "Applications")]
#[get("/applications/mine")]
pub async fn my_applications(
    state: &State<AppState>,
    session: SessionGuard,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let applications = reporting::my_applications(state.inner(), &session.0).await?;
    Ok(Json(ApiResponse::success(
        applications.into_iter().map(ApplicationResponse::from).collect(),
    )))
}

#[openapi(tag = "Applications")]
#[get("/applications/<category>/<id>")]
pub async fn get_application(
    state: &State<AppState>,
    session: SessionGuard,
    category: ServiceCategory,
    id: &str,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    let id = parse_id(id, "Application")?;
    let application = lifecycle::get_application(state.inner(), Some(&session.0), category, id).await?;
    Ok(Json(ApiResponse::success(application.into())))
}

#[openapi(tag = "Applications")]
#[put("/applications/<category>/<id>", data = "<dto>")]
pub async fn update_application(
    state: &State<AppState>,
    session: SessionGuard,
    category: ServiceCategory,
    id: &str,
    dto: Json<UpdateApplicationDto>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    let id = parse_id(id, "Application")?;
    let application = lifecycle::update_application(
        state.inner(),
        Some(&session.0),
        category,
        id,
        dto.into_inner().form_data,
    )
    .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Application updated",
        application.into(),
    )))
}

#[openapi(tag = "Applications")]
#[put("/applications/<category>/<id>/status", data = "<dto>")]
pub async fn update_status(
    state: &State<AppState>,
    session: SessionGuard,
    category: ServiceCategory,
    id: &str,
    dto: Json<UpdateStatusDto>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    let id = parse_id(id, "Application")?;
    let application =
        lifecycle::update_status(state.inner(), Some(&session.0), category, id, &dto.status).await?;

    Ok(Json(ApiResponse::success_with_message(
        format!("Status updated to {}", application.status),
        application.into(),
    )))
}

#[openapi(tag = "Applications")]
#[post("/applications/<category>/<id>/archive")]
pub async fn archive_application(
    state: &State<AppState>,
    session: SessionGuard,
    category: ServiceCategory,
    id: &str,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    let id = parse_id(id, "Application")?;
    let application = lifecycle::archive_application(state.inner(), Some(&session.0), category, id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Application archived",
        application.into(),
    )))
}

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::PartnerGuard;
use crate::models::{ApplicationResponse, ClientResponse, PartnerAnalytics};
use crate::services::authorization::parse_id;
use crate::services::{relationships, reporting};
use crate::state::AppState;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Partner")]
#[get("/partner/clients")]
pub async fn my_clients(
    state: &State<AppState>,
    partner: PartnerGuard,
) -> Result<Json<ApiResponse<Vec<ClientResponse>>>, ApiError> {
    let clients = relationships::partner_clients(state.inner(), &partner.0).await?;
    Ok(Json(ApiResponse::success(
        clients.into_iter().map(ClientResponse::from).collect(),
    )))
}

#[openapi(tag = "Partner")]
#[delete("/partner/clients/<client_id>")]
pub async fn release_client(
    state: &State<AppState>,
    partner: PartnerGuard,
    client_id: &str,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_id(client_id, "Client")?;
    relationships::disassociate_client(state.inner(), &partner.0, id).await?;
    Ok(Json(ApiResponse::message("Client removed from your account")))
}

#[openapi(tag = "Partner")]
#[get("/partner/clients/<client_id>/applications")]
pub async fn client_applications(
    state: &State<AppState>,
    partner: PartnerGuard,
    client_id: &str,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let id = parse_id(client_id, "Client")?;
    let applications = reporting::partner_client_applications(state.inner(), &partner.0, id).await?;
    Ok(Json(ApiResponse::success(
        applications.into_iter().map(ApplicationResponse::from).collect(),
    )))
}

#[openapi(tag = "Partner")]
#[get("/partner/applications")]
pub async fn submitted_applications(
    state: &State<AppState>,
    partner: PartnerGuard,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let applications = reporting::partner_applications(state.inner(), partner.0.id).await?;
    Ok(Json(ApiResponse::success(
        applications.into_iter().map(ApplicationResponse::from).collect(),
    )))
}

#[openapi(tag = "Partner")]
#[get("/partner/analytics")]
pub async fn analytics(
    state: &State<AppState>,
    partner: PartnerGuard,
) -> Result<Json<ApiResponse<PartnerAnalytics>>, ApiError> {
    let analytics = reporting::partner_analytics(state.inner(), &partner.0).await?;
    Ok(Json(ApiResponse::success(analytics)))
}

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::guards::AdminGuard;
use crate::models::{
    AdminDashboard, Application, ApplicationResponse, ClientResponse, PartnerResponse, ReassignClientDto,
};
use crate::services::authorization::parse_id;
use crate::services::{relationships, reporting};
use crate::state::AppState;
use crate::utils::{ApiError, ApiResponse};

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRemoval {
    pub released_clients: u64,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientDeletion {
    pub deleted_applications: usize,
}

#[derive(FromForm, serde::Deserialize, JsonSchema)]
pub struct PartnerListQuery {
    pub approved: Option<bool>,
}

fn listing(applications: Vec<Application>) -> Json<ApiResponse<Vec<ApplicationResponse>>> {
    Json(ApiResponse::success(
        applications.into_iter().map(ApplicationResponse::from).collect(),
    ))
}

// ==================== APPLICATIONS ====================

#[openapi(tag = "Admin - Applications")]
#[get("/admin/applications")]
pub async fn all_applications(
    state: &State<AppState>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    Ok(listing(reporting::admin_applications(state.inner()).await?))
}

#[openapi(tag = "Admin - Applications")]
#[get("/admin/dashboard")]
pub async fn dashboard(
    state: &State<AppState>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<AdminDashboard>>, ApiError> {
    let dashboard = reporting::admin_dashboard(state.inner()).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

// ==================== PARTNERS ====================

#[openapi(tag = "Admin - Partners")]
#[get("/admin/partners?<query..>")]
pub async fn list_partners(
    state: &State<AppState>,
    _admin: AdminGuard,
    query: PartnerListQuery,
) -> Result<Json<ApiResponse<Vec<PartnerResponse>>>, ApiError> {
    let partners = relationships::list_partners(state.inner(), query.approved).await?;
    Ok(Json(ApiResponse::success(
        partners.into_iter().map(PartnerResponse::from).collect(),
    )))
}

#[openapi(tag = "Admin - Partners")]
#[put("/admin/partners/<partner_id>/approve")]
pub async fn approve_partner(
    state: &State<AppState>,
    _admin: AdminGuard,
    partner_id: &str,
) -> Result<Json<ApiResponse<PartnerResponse>>, ApiError> {
    let id = parse_id(partner_id, "Partner")?;
    let partner = relationships::approve_partner(state.inner(), id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Partner approved",
        partner.into(),
    )))
}

#[openapi(tag = "Admin - Partners")]
#[put("/admin/partners/<partner_id>/remove")]
pub async fn remove_partner(
    state: &State<AppState>,
    _admin: AdminGuard,
    partner_id: &str,
) -> Result<Json<ApiResponse<PartnerRemoval>>, ApiError> {
    let id = parse_id(partner_id, "Partner")?;
    let released = relationships::remove_partner(state.inner(), id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Partner removed and clients released",
        PartnerRemoval { released_clients: released },
    )))
}

#[openapi(tag = "Admin - Partners")]
#[get("/admin/partners/<partner_id>/applications")]
pub async fn partner_applications(
    state: &State<AppState>,
    _admin: AdminGuard,
    partner_id: &str,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let id = parse_id(partner_id, "Partner")?;
    Ok(listing(reporting::partner_applications(state.inner(), id).await?))
}

// ==================== CLIENTS ====================

#[openapi(tag = "Admin - Clients")]
#[get("/admin/clients")]
pub async fn list_clients(
    state: &State<AppState>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<Vec<ClientResponse>>>, ApiError> {
    let clients = relationships::list_clients(state.inner()).await?;
    Ok(Json(ApiResponse::success(
        clients.into_iter().map(ClientResponse::from).collect(),
    )))
}

#[openapi(tag = "Admin - Clients")]
#[put("/admin/clients/<client_id>/partner", data = "<dto>")]
pub async fn reassign_client(
    state: &State<AppState>,
    _admin: AdminGuard,
    client_id: &str,
    dto: Json<ReassignClientDto>,
) -> Result<Json<ApiResponse<ClientResponse>>, ApiError> {
    let client_id = parse_id(client_id, "Client")?;
    let partner_id = parse_id(&dto.partner_id, "Partner")?;
    let client = relationships::reassign_client(state.inner(), client_id, partner_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Client reassigned",
        client.into(),
    )))
}

#[openapi(tag = "Admin - Clients")]
#[delete("/admin/clients/<client_id>")]
pub async fn delete_client(
    state: &State<AppState>,
    _admin: AdminGuard,
    client_id: &str,
) -> Result<Json<ApiResponse<ClientDeletion>>, ApiError> {
    let id = parse_id(client_id, "Client")?;
    let deleted = relationships::delete_client(state.inner(), id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Client and all of their applications were deleted",
        ClientDeletion { deleted_applications: deleted },
    )))
}

#[openapi(tag = "Admin - Clients")]
#[get("/admin/clients/<client_id>/applications")]
pub async fn client_applications(
    state: &State<AppState>,
    _admin: AdminGuard,
    client_id: &str,
) -> Result<Json<ApiResponse<Vec<ApplicationResponse>>>, ApiError> {
    let id = parse_id(client_id, "Client")?;
    Ok(listing(reporting::client_applications(state.inner(), id).await?))
}

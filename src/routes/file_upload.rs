use data_encoding::BASE64;
use log::{info, warn};
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket::State;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::guards::SessionGuard;
use crate::services::AppError;
use crate::state::AppState;
use crate::utils::{ApiError, ApiResponse};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// UPLOAD STRUCTS
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct Base64UploadRequest {
    pub filename: String,
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub url: String,
    pub size: usize,
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn extension_from_filename(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn extension_from_mime(mime_type: &str) -> Option<String> {
    match mime_type {
        "image/jpeg" | "image/jpg" => Some("jpg".to_string()),
        "image/png" => Some("png".to_string()),
        "image/webp" => Some("webp".to_string()),
        "application/pdf" => Some("pdf".to_string()),
        _ => None,
    }
}

pub fn is_valid_document_extension(ext: &str) -> bool {
    matches!(ext, "pdf" | "jpg" | "jpeg" | "png" | "webp")
}

/// Strips an optional `data:<mime>;base64,` header before decoding.
pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match data.split_once(";base64,") {
        Some((_, body)) => body,
        None => data,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    BASE64
        .decode(cleaned.as_bytes())
        .map_err(|_| ApiError::bad_request("Invalid base64 data"))
}

async fn persist(state: &AppState, bytes: &[u8], extension: &str) -> Result<UploadedFile, ApiError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::bad_request("File size exceeds 10MB limit"));
    }

    let url = state
        .files
        .store(bytes, extension)
        .await
        .map_err(|e| ApiError::from(AppError::ExternalService(format!("file store: {}", e))))?;

    Ok(UploadedFile { url, size: bytes.len() })
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[openapi(tag = "File Upload")]
#[post("/upload/document", data = "<file>")]
pub async fn upload_document(
    state: &State<AppState>,
    session: SessionGuard,
    file: TempFile<'_>,
) -> Result<Json<ApiResponse<UploadedFile>>, ApiError> {
    // only the extension is taken from the client's name, and it is whitelisted below
    let extension = file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
        .and_then(extension_from_filename)
        .or_else(|| {
            file.content_type()
                .and_then(|ct| extension_from_mime(&ct.to_string()))
        })
        .ok_or_else(|| ApiError::bad_request("Cannot determine file type"))?;

    if !is_valid_document_extension(&extension) {
        return Err(ApiError::bad_request(format!(
            "Only PDF, JPEG, PNG and WebP files are allowed. Received: '{}'",
            extension
        )));
    }

    if file.len() as usize > MAX_UPLOAD_BYTES {
        return Err(ApiError::bad_request("File size exceeds 10MB limit"));
    }

    let mut bytes = Vec::with_capacity(file.len() as usize);
    let mut reader = file
        .open()
        .await
        .map_err(|e| ApiError::from(AppError::Unexpected(format!("read upload: {}", e))))?;
    reader
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| ApiError::from(AppError::Unexpected(format!("read upload: {}", e))))?;

    let uploaded = persist(state.inner(), &bytes, &extension).await?;
    info!("{} uploaded {} ({} bytes)", session.0.id, uploaded.url, uploaded.size);

    Ok(Json(ApiResponse::success_with_message(
        "Document uploaded successfully",
        uploaded,
    )))
}

#[openapi(tag = "File Upload")]
#[post("/upload/document-base64", data = "<request>")]
pub async fn upload_document_base64(
    state: &State<AppState>,
    session: SessionGuard,
    request: Json<Base64UploadRequest>,
) -> Result<Json<ApiResponse<UploadedFile>>, ApiError> {
    let extension = extension_from_mime(&request.mime_type)
        .or_else(|| extension_from_filename(&request.filename))
        .filter(|ext| is_valid_document_extension(ext))
        .ok_or_else(|| {
            warn!("Rejected upload with MIME type {}", request.mime_type);
            ApiError::bad_request(format!(
                "Invalid MIME type: {}. Allowed: image/jpeg, image/png, image/webp, application/pdf",
                request.mime_type
            ))
        })?;

    let bytes = decode_base64_payload(&request.data)?;
    let uploaded = persist(state.inner(), &bytes, &extension).await?;
    info!("{} uploaded {} ({} bytes)", session.0.id, uploaded.url, uploaded.size);

    Ok(Json(ApiResponse::success_with_message(
        "Document uploaded successfully",
        uploaded,
    )))
}

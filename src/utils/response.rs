use indexmap::IndexMap;
use log::error;
use rocket_okapi::okapi::Map;
use serde::{Deserialize, Serialize};
use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::Request;
use std::io::Cursor;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::response::OpenApiResponderInner;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{MediaType, Response as OpenApiResponse, Responses};

use crate::services::AppError;

/// Field name -> messages, in the order the problems were found.
pub type FieldErrors = IndexMap<String, Vec<String>>;

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// -----------------------------
/// Uniform API envelope
/// -----------------------------
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<std::collections::HashMap<String, Vec<String>>>")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            errors: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.into()),
            errors: None,
            data: Some(data),
        }
    }

    pub fn error(message: String, errors: Option<FieldErrors>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            message: Some(message),
            errors,
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.into()),
            errors: None,
            data: None,
        }
    }
}

/// -----------------------------
/// API Error
/// -----------------------------
#[derive(Debug, Serialize, JsonSchema)]
pub struct ApiError {
    #[schemars(skip)]
    #[serde(skip_serializing)]
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<std::collections::HashMap<String, Vec<String>>>")]
    pub errors: Option<FieldErrors>,
}

impl ApiError {
    fn new(status: Status, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
            errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Status::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(Status::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(Status::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Status::NotFound, message)
    }

    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        ApiError {
            status: Status::UnprocessableEntity,
            message: message.into(),
            errors: Some(errors),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(Status::BadGateway, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(Status::InternalServerError, message)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Unauthorized => ApiError::unauthorized("Unauthorized"),
            AppError::Forbidden => ApiError::forbidden("Forbidden"),
            AppError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            AppError::Validation(errors) => {
                ApiError::validation("Please correct the highlighted fields", errors)
            }
            AppError::InvalidCredentials(message) => ApiError::unauthorized(message),
            AppError::ExternalService(message) => {
                error!("External service failure: {}", message);
                ApiError::bad_gateway(GENERIC_FAILURE)
            }
            AppError::Unexpected(detail) => {
                error!("Unexpected error: {}", detail);
                ApiError::internal_error(GENERIC_FAILURE)
            }
        }
    }
}

/// -----------------------------
/// Rocket Responder
/// -----------------------------
impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = serde_json::to_string(&ApiResponse::<()>::error(self.message, self.errors))
            .unwrap_or_else(|_| r#"{"success":false,"message":"Internal error"}"#.to_string());

        Response::build()
            .status(self.status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

/// -----------------------------
/// OpenAPI integration
/// -----------------------------
impl OpenApiResponderInner for ApiError {
    fn responses(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let schema = generator.json_schema::<ApiResponse<()>>();

        let mut content = Map::new();
        content.insert(
            "application/json".to_owned(),
            MediaType {
                schema: Some(schema),
                ..Default::default()
            },
        );

        let mut responses = Responses::default();

        for (code, description) in [
            ("400", "Bad request"),
            ("401", "Unauthorized"),
            ("403", "Forbidden"),
            ("404", "Not found"),
            ("422", "Validation failed"),
            ("500", "Internal server error"),
            ("502", "External service failure"),
        ] {
            responses.responses.insert(
                code.to_string(),
                rocket_okapi::okapi::openapi3::RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    content: content.clone(),
                    ..Default::default()
                }),
            );
        }

        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_errors_hide_their_detail() {
        let err = ApiError::from(AppError::Unexpected("connection reset by peer".into()));
        assert_eq!(err.status, Status::InternalServerError);
        assert_eq!(err.message, GENERIC_FAILURE);
    }

    #[test]
    fn validation_errors_keep_field_map() {
        let mut fields = FieldErrors::new();
        fields.insert("email".into(), vec!["Invalid email".into()]);
        let err = ApiError::from(AppError::Validation(fields));
        assert_eq!(err.status, Status::UnprocessableEntity);

        let body = serde_json::to_value(ApiResponse::<()>::error(err.message, err.errors)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"]["email"][0], "Invalid email");
        assert!(body.get("data").is_none());
    }
}

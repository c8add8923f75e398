use thiserror::Error;

use crate::db::StoreError;
use crate::utils::FieldErrors;

/// Failure taxonomy shared by every business operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// Login and reset flows; the message never reveals which check failed.
    #[error("{0}")]
    InvalidCredentials(&'static str),

    #[error("external service failure: {0}")]
    ExternalService(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        AppError::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Unexpected(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Unexpected(format!("password hashing failed: {}", err))
    }
}

pub mod accounts;
pub mod authorization;
pub mod email;
pub mod error;
pub mod lifecycle;
pub mod notifications;
pub mod outbox;
pub mod relationships;
pub mod reporting;
pub mod session;
pub mod storage;

#[cfg(test)]
pub mod testing;

pub use error::{AppError, AppResult};

pub mod application;
pub mod outbox;
pub mod partner;
pub mod report;
pub mod session;
pub mod user;

pub use application::*;
pub use outbox::*;
pub use partner::*;
pub use report::*;
pub use session::*;
pub use user::*;

use mongodb::bson::DateTime;

pub fn millis_to_rfc3339(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

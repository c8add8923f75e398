pub mod session;

pub use session::{AdminGuard, OptionalSession, PartnerGuard, SessionGuard};

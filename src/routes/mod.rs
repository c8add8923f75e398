pub mod admin;
pub mod application;
pub mod auth;
pub mod file_upload;
pub mod partner;

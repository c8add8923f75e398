#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod state;
mod utils;

use dotenvy::dotenv;
use log::{debug, info, warn};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::{FileServer, Options};
use rocket::http::Header;
use rocket::serde::json::Json;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use crate::config::{Config, Settings};
use crate::utils::{ApiResponse, GENERIC_FAILURE};

/* ----------------------------- CORS ----------------------------- */

/// Sessions ride on cookies, so only configured origins get credentialed access.
pub struct CORS {
    allowed_origins: Vec<String>,
}

impl CORS {
    pub fn new(allowed_origins: &[String]) -> Self {
        CORS {
            allowed_origins: allowed_origins.to_vec(),
        }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Vary", "Origin"));

        let Some(origin) = request.headers().get_one("Origin") else {
            return;
        };
        if !self.allows(origin) {
            debug!("CORS refused for origin {}", origin);
            return;
        }

        response.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn failure(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse::<()>::error(message.to_string(), None))
}

#[catch(400)]
fn bad_request() -> Json<ApiResponse<()>> {
    failure("Malformed request")
}

#[catch(401)]
fn unauthorized() -> Json<ApiResponse<()>> {
    failure("Unauthorized")
}

#[catch(403)]
fn forbidden() -> Json<ApiResponse<()>> {
    failure("Forbidden")
}

#[catch(404)]
fn not_found() -> Json<ApiResponse<()>> {
    failure("Resource not found (check /api/v1 prefix)")
}

#[catch(422)]
fn unprocessable() -> Json<ApiResponse<()>> {
    failure("Request body does not match the expected shape")
}

#[catch(500)]
fn internal_error() -> Json<ApiResponse<()>> {
    failure(GENERIC_FAILURE)
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- MOUNT ----------------------------- */

/// Everything except the database fairing, so tests can manage their own state.
fn mount(rocket: Rocket<Build>, settings: &Settings) -> Rocket<Build> {
    rocket
        .attach(CORS::new(&settings.cors_origins))
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Auth
                routes::auth::sign_up_user,
                routes::auth::sign_up_partner,
                routes::auth::login,
                routes::auth::logout,
                routes::auth::check_session,
                routes::auth::forgot_password,
                routes::auth::reset_password,
                // Applications
                routes::application::submit_application,
                routes::application::my_applications,
                routes::application::get_application,
                routes::application::update_application,
                routes::application::update_status,
                routes::application::archive_application,
                // Admin
                routes::admin::all_applications,
                routes::admin::dashboard,
                routes::admin::list_partners,
                routes::admin::approve_partner,
                routes::admin::remove_partner,
                routes::admin::partner_applications,
                routes::admin::list_clients,
                routes::admin::reassign_client,
                routes::admin::delete_client,
                routes::admin::client_applications,
                // Partner
                routes::partner::my_clients,
                routes::partner::release_client,
                routes::partner::client_applications,
                routes::partner::submitted_applications,
                routes::partner::analytics,
                // Uploads
                routes::file_upload::upload_document,
                routes::file_upload::upload_document_base64,
            ],
        )
        .mount("/uploads", FileServer::new(&settings.upload_dir, Options::Missing))
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![bad_request, unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    let settings = Config::settings();
    info!("🚀 FinServ Marketplace API starting");
    info!("📚 Swagger UI → {}/api/docs", settings.public_base_url);
    if settings.uses_default_session_secret() {
        warn!("⚠ session_secret is not configured; session tokens can be forged. Set ROCKET_SESSION_SECRET.");
    }

    let rocket = rocket::build()
        .attach(db::init(settings.clone()))
        .attach(services::outbox::retry_fairing());
    mount(rocket, &settings)
}

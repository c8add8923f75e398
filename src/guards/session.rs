use log::debug;
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};

// === OpenAPI ===
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

use crate::models::Identity;
use crate::services::authorization::{verify_admin, verify_partner};
use crate::services::session::{resolve_session, CookieBundle};
use crate::services::{AppError, AppResult};
use crate::state::AppState;

/// Resolves the cookie bundle once per request.
async fn cached_identity(req: &Request<'_>) -> Option<Identity> {
    req.local_cache_async(async {
        let state = req.rocket().state::<AppState>()?;
        let bundle = CookieBundle::from_jar(req.cookies());
        resolve_session(state.store(), &bundle, &state.settings.session_secret).await
    })
    .await
    .clone()
}

/// Runs an authorization predicate against the cached session.
async fn authorize<'r, G>(
    req: &'r Request<'_>,
    check: fn(Option<&Identity>) -> AppResult<&Identity>,
    wrap: fn(Identity) -> G,
) -> request::Outcome<G, ()> {
    let identity = cached_identity(req).await;
    match check(identity.as_ref()) {
        Ok(identity) => Outcome::Success(wrap(identity.clone())),
        Err(AppError::Forbidden) => {
            debug!("{} refused on {}", identity.as_ref().map(|i| i.id.to_hex()).unwrap_or_default(), req.uri());
            Outcome::Error((Status::Forbidden, ()))
        }
        Err(_) => Outcome::Error((Status::Unauthorized, ())),
    }
}

/// Any signed-in account.
pub struct SessionGuard(pub Identity);

/// The caller if signed in; never fails.
pub struct OptionalSession(pub Option<Identity>);

/// A signed-in admin. Missing session is 401, a non-admin session 403.
pub struct AdminGuard(pub Identity);

/// A signed-in, approved partner.
pub struct PartnerGuard(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match cached_identity(req).await {
            Some(identity) => Outcome::Success(SessionGuard(identity)),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalSession {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        Outcome::Success(OptionalSession(cached_identity(req).await))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        authorize(req, verify_admin, AdminGuard).await
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PartnerGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        authorize(req, verify_partner, PartnerGuard).await
    }
}

macro_rules! no_openapi_input {
    ($($guard:ty),*) => {
        $(
            impl<'a> OpenApiFromRequest<'a> for $guard {
                fn from_request_input(
                    _gen: &mut OpenApiGenerator,
                    _name: String,
                    _required: bool,
                ) -> rocket_okapi::Result<RequestHeaderInput> {
                    // authenticated by cookies; nothing to document per route
                    Ok(RequestHeaderInput::None)
                }
            }
        )*
    };
}

no_openapi_input!(SessionGuard, OptionalSession, AdminGuard, PartnerGuard);

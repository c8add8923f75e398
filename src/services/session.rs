//! Cookie-bundle sessions. The bundle carries display fields for the UI;
//! `session_token` is a signed JWT over the same identity, and only what the
//! token asserts is trusted.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, warn};
use mongodb::bson::oid::ObjectId;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::time::{Duration, OffsetDateTime};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::db::Store;
use crate::models::{BusinessModel, Identity, Role};

pub const SESSION_TOKEN: &str = "session_token";
pub const USER_ID: &str = "user_id";
pub const USER_NAME: &str = "user_name";
pub const USER_EMAIL: &str = "user_email";
pub const USER_TYPE: &str = "user_type";
pub const IS_ADMIN: &str = "is_admin";
pub const BUSINESS_MODEL: &str = "business_model";

pub const ALL_COOKIES: [&str; 7] = [
    SESSION_TOKEN,
    USER_ID,
    USER_NAME,
    USER_EMAIL,
    USER_TYPE,
    IS_ADMIN,
    BUSINESS_MODEL,
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub admin: bool,
    #[serde(default)]
    pub business_model: Option<BusinessModel>,
    pub iat: i64,
    pub exp: i64,
}

/// Raw cookie values; empty values count as absent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CookieBundle {
    pub session_token: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_type: Option<String>,
    pub is_admin: Option<String>,
    pub business_model: Option<String>,
}

impl CookieBundle {
    pub fn from_jar(jar: &CookieJar<'_>) -> Self {
        let read = |name: &str| {
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        };

        CookieBundle {
            session_token: read(SESSION_TOKEN),
            user_id: read(USER_ID),
            user_name: read(USER_NAME),
            user_email: read(USER_EMAIL),
            user_type: read(USER_TYPE),
            is_admin: read(IS_ADMIN),
            business_model: read(BUSINESS_MODEL),
        }
    }
}

pub fn issue_token(
    identity: &Identity,
    secret: &str,
    ttl_days: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();

    let claims = SessionClaims {
        sub: identity.id.to_hex(),
        name: identity.name.clone(),
        email: identity.email.clone(),
        role: identity.role,
        admin: identity.is_admin,
        business_model: identity.business_model,
        iat: now,
        exp: now + ttl_days * 24 * 60 * 60,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// The bundle is a session only when every required cookie is present, the
/// token verifies, and the id/role/admin cookies agree with it.
pub fn verify_bundle(bundle: &CookieBundle, secret: &str) -> Option<SessionClaims> {
    let (Some(token), Some(user_id), Some(_), Some(_), Some(user_type)) = (
        bundle.session_token.as_deref(),
        bundle.user_id.as_deref(),
        bundle.user_name.as_deref(),
        bundle.user_email.as_deref(),
        bundle.user_type.as_deref(),
    ) else {
        return None;
    };

    let claims = match decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            debug!("Rejected session token: {}", e);
            return None;
        }
    };

    let admin_cookie = bundle.is_admin.as_deref() == Some("true");
    let business_cookie = bundle.business_model.as_deref();
    let claimed_business = claims.business_model.map(|b| b.as_str());

    if claims.sub != user_id
        || claims.role.as_str() != user_type
        || claims.admin != admin_cookie
        || (claims.role == Role::Partner && claimed_business != business_cookie)
    {
        warn!("Session cookies disagree with their token for {}", user_id);
        return None;
    }

    Some(claims)
}

/// Verifies the bundle and refreshes the identity from its backing document.
/// Any failure, including a store error, means "no session".
pub async fn resolve_session(
    store: &dyn Store,
    bundle: &CookieBundle,
    secret: &str,
) -> Option<Identity> {
    let claims = verify_bundle(bundle, secret)?;
    let id = ObjectId::parse_str(&claims.sub).ok()?;

    match claims.role {
        Role::Normal => {
            let user = match store.find_user(id).await {
                Ok(found) => found?,
                Err(e) => {
                    warn!("Session lookup failed for user {}: {}", id, e);
                    return None;
                }
            };
            Some(Identity {
                id,
                name: user.full_name,
                email: user.email,
                role: Role::Normal,
                is_admin: user.is_admin.unwrap_or(false),
                business_model: None,
                partner_id: user.partner_id,
            })
        }
        Role::Partner => {
            let partner = match store.find_partner(id).await {
                Ok(found) => found?,
                Err(e) => {
                    warn!("Session lookup failed for partner {}: {}", id, e);
                    return None;
                }
            };
            if !partner.is_approved {
                return None;
            }
            Some(Identity {
                id,
                name: partner.display_name(),
                email: partner.email.clone(),
                role: Role::Partner,
                is_admin: partner.is_admin,
                business_model: Some(partner.business_model),
                partner_id: None,
            })
        }
    }
}

fn session_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(max_age)
        .build()
}

pub fn write_cookies(
    jar: &CookieJar<'_>,
    identity: &Identity,
    settings: &Settings,
) -> Result<(), jsonwebtoken::errors::Error> {
    let token = issue_token(identity, &settings.session_secret, settings.session_ttl_days)?;
    let max_age = Duration::days(settings.session_ttl_days);

    jar.add(session_cookie(SESSION_TOKEN, token, max_age));
    jar.add(session_cookie(USER_ID, identity.id.to_hex(), max_age));
    jar.add(session_cookie(USER_NAME, identity.name.clone(), max_age));
    jar.add(session_cookie(USER_EMAIL, identity.email.clone(), max_age));
    jar.add(session_cookie(USER_TYPE, identity.role.as_str().to_string(), max_age));
    if identity.is_admin {
        jar.add(session_cookie(IS_ADMIN, "true".to_string(), max_age));
    } else {
        jar.add(expired(IS_ADMIN));
    }
    match identity.business_model {
        Some(model) => jar.add(session_cookie(BUSINESS_MODEL, model.as_str().to_string(), max_age)),
        None => jar.add(expired(BUSINESS_MODEL)),
    }
    Ok(())
}

fn expired(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, String::new()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

pub fn clear_cookies(jar: &CookieJar<'_>) {
    for name in ALL_COOKIES {
        jar.add(expired(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{partner_identity, user_identity, TestEnv};

    const SECRET: &str = "test-session-secret";

    fn bundle_for(identity: &Identity, token: String) -> CookieBundle {
        CookieBundle {
            session_token: Some(token),
            user_id: Some(identity.id.to_hex()),
            user_name: Some(identity.name.clone()),
            user_email: Some(identity.email.clone()),
            user_type: Some(identity.role.as_str().to_string()),
            is_admin: identity.is_admin.then(|| "true".to_string()),
            business_model: identity.business_model.map(|b| b.as_str().to_string()),
        }
    }

    #[tokio::test]
    async fn complete_bundle_resolves_with_current_partner() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let user = env.user("asha@example.com", partner.id).await;

        let mut identity = user_identity(&user);
        identity.partner_id = None;
        let bundle = bundle_for(&identity, issue_token(&identity, SECRET, 7).unwrap());

        let resolved = resolve_session(env.state.store(), &bundle, SECRET).await.unwrap();
        assert_eq!(resolved.id, user.id.unwrap());
        assert_eq!(resolved.partner_id, partner.id);
    }

    #[tokio::test]
    async fn any_missing_field_means_no_session() {
        let env = TestEnv::new();
        let user = env.user("asha@example.com", None).await;
        let identity = user_identity(&user);
        let full = bundle_for(&identity, issue_token(&identity, SECRET, 7).unwrap());

        let strip: [fn(&mut CookieBundle); 5] = [
            |b| b.session_token = None,
            |b| b.user_id = None,
            |b| b.user_name = None,
            |b| b.user_email = None,
            |b| b.user_type = None,
        ];
        for remove in strip {
            let mut partial = full.clone();
            remove(&mut partial);
            assert!(resolve_session(env.state.store(), &partial, SECRET).await.is_none());
        }
    }

    #[test]
    fn forged_admin_cookie_is_rejected() {
        let user_id = ObjectId::new();
        let identity = Identity {
            id: user_id,
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: Role::Normal,
            is_admin: false,
            business_model: None,
            partner_id: None,
        };
        let mut bundle = bundle_for(&identity, issue_token(&identity, SECRET, 7).unwrap());
        assert!(verify_bundle(&bundle, SECRET).is_some());

        bundle.is_admin = Some("true".into());
        assert!(verify_bundle(&bundle, SECRET).is_none());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let identity = Identity {
            id: ObjectId::new(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: Role::Normal,
            is_admin: false,
            business_model: None,
            partner_id: None,
        };
        let bundle = bundle_for(&identity, issue_token(&identity, "other", 7).unwrap());
        assert!(verify_bundle(&bundle, SECRET).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let identity = Identity {
            id: ObjectId::new(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: Role::Normal,
            is_admin: false,
            business_model: None,
            partner_id: None,
        };
        let bundle = bundle_for(&identity, issue_token(&identity, SECRET, -1).unwrap());
        assert!(verify_bundle(&bundle, SECRET).is_none());
    }

    #[tokio::test]
    async fn unapproved_partner_has_no_session() {
        let env = TestEnv::new();
        let partner = env.partner("agent@finserv.in", true).await;
        let identity = partner_identity(&partner);
        let bundle = bundle_for(&identity, issue_token(&identity, SECRET, 7).unwrap());

        assert!(resolve_session(env.state.store(), &bundle, SECRET).await.is_some());

        env.store.set_partner_approval(partner.id.unwrap(), false).await.unwrap();
        assert!(resolve_session(env.state.store(), &bundle, SECRET).await.is_none());
    }
}

//! Session cookies and the checks every handler starts with.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use cookie::time;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::identity::IdentityUser;
use crate::store::SupportStaff;

use super::error::ApiError;
use super::state::AppState;

pub const USER_SESSION_COOKIE: &str = "session_token";
pub const ADMIN_SESSION_COOKIE: &str = "admin_session";
pub const SUPPORT_SESSION_COOKIE: &str = "support_session";

const USER_SESSION_MAX_AGE: time::Duration = time::Duration::days(60);

pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// Who is acting on an admin endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminPrincipal {
    pub admin_id: String,
    pub role: String,
    pub permissions: Value,
}

/// Admin id recorded for actions taken through the console login.
pub fn console_admin_id(username: &str) -> String {
    format!("{username}_admin")
}

pub fn all_permissions() -> Value {
    json!({ "all": true })
}

pub fn session_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .max_age(max_age)
        .build()
}

pub fn user_session_cookie(token: String, secure: bool) -> Cookie<'static> {
    session_cookie(USER_SESSION_COOKIE, token, USER_SESSION_MAX_AGE, secure)
}

/// An expired, empty cookie that makes the browser drop `name`.
pub fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    session_cookie(name, String::new(), time::Duration::ZERO, secure)
}

pub fn to_cookie_max_age(ttl: std::time::Duration) -> time::Duration {
    time::Duration::try_from(ttl).unwrap_or(time::Duration::days(1))
}

/// The identity user behind the `session_token` cookie, if any.
pub async fn resolve_user(state: &AppState, jar: &CookieJar) -> Result<Option<IdentityUser>, ApiError> {
    let Some(token) = jar.get(USER_SESSION_COOKIE).map(Cookie::value) else {
        return Ok(None);
    };
    if token.is_empty() {
        return Ok(None);
    }
    Ok(state.identity.current_user(token).await?)
}

pub async fn require_user(state: &AppState, jar: &CookieJar) -> Result<IdentityUser, ApiError> {
    resolve_user(state, jar).await?.ok_or(ApiError::Unauthorized)
}

/// Like [`require_user`], but refuses users with an active block.
pub async fn require_active_user(state: &AppState, jar: &CookieJar) -> Result<IdentityUser, ApiError> {
    let user = require_user(state, jar).await?;
    if state.store.is_blocked(&user.id, Utc::now()).await? {
        warn!(user_id = %user.id, "blocked user attempted a write");
        return Err(ApiError::forbidden("Your account has been blocked"));
    }
    Ok(user)
}

/// Resolves the acting admin: a console session first, then a signed-in user
/// with an `admin_users` row. Anyone else is refused.
pub async fn resolve_admin(state: &AppState, jar: &CookieJar) -> Result<AdminPrincipal, ApiError> {
    if let Some(token) = jar.get(ADMIN_SESSION_COOKIE).map(Cookie::value) {
        if let Some(username) = state.admin_sessions.get(token) {
            debug!(username = %username, "admin resolved from console session");
            return Ok(AdminPrincipal {
                admin_id: console_admin_id(&username),
                role: String::from(SUPER_ADMIN_ROLE),
                permissions: all_permissions(),
            });
        }
    }

    let user = require_user(state, jar).await?;
    let Some(admin) = state.store.admin_user(&user.id).await? else {
        warn!(user_id = %user.id, "non-admin attempted an admin endpoint");
        return Err(ApiError::forbidden("Not an admin"));
    };

    let permissions = admin
        .permissions
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);
    debug!(user_id = %user.id, role = %admin.role, "admin resolved from user session");
    Ok(AdminPrincipal {
        admin_id: admin.user_id,
        role: admin.role,
        permissions,
    })
}

/// The active support staff member behind the `support_session` cookie.
pub async fn require_support(state: &AppState, jar: &CookieJar) -> Result<SupportStaff, ApiError> {
    let staff_id = jar
        .get(SUPPORT_SESSION_COOKIE)
        .and_then(|cookie| state.support_sessions.get(cookie.value()))
        .ok_or(ApiError::Unauthorized)?;
    state
        .store
        .support_staff(staff_id)
        .await?
        .ok_or(ApiError::Unauthorized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum_extra::extract::cookie::SameSite;
    use cookie::time;

    use super::{console_admin_id, removal_cookie, user_session_cookie, USER_SESSION_COOKIE};

    #[test]
    fn user_cookie_is_long_lived_and_http_only() {
        let cookie = user_session_cookie(String::from("tok"), true);
        assert_eq!(cookie.name(), USER_SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(60)));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = removal_cookie(USER_SESSION_COOKIE, false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn console_admins_get_suffixed_ids() {
        assert_eq!(console_admin_id("owner"), "owner_admin");
    }
}

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::verify_password;
use crate::store::{NewTicket, SupportResponse, SupportTicket};

use super::auth::{
    removal_cookie, require_support, resolve_user, session_cookie, to_cookie_max_age,
    SUPPORT_SESSION_COOKIE,
};
use super::error::{ApiError, ApiJson};
use super::responses::{
    LoginRequest, SuccessResponse, SupportLoginResponse, SupportUser, TicketResponseRequest,
    TicketStatusRequest,
};
use super::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<SupportLoginResponse>), ApiError> {
    let username = body.username.trim();
    let staff = state
        .store
        .support_staff_by_username(username)
        .await?
        .filter(|staff| verify_password(&body.password, &staff.password_hash))
        .ok_or_else(|| {
            warn!(username, "support login refused");
            ApiError::Unauthorized
        })?;

    let token = state.support_sessions.create(staff.id);
    let cookie = session_cookie(
        SUPPORT_SESSION_COOKIE,
        token,
        to_cookie_max_age(state.support_sessions.ttl()),
        state.settings.secure_cookies,
    );
    info!(username, staff_id = staff.id, "support login");
    Ok((
        jar.add(cookie),
        Json(SupportLoginResponse {
            success: true,
            user: staff.into(),
        }),
    ))
}

pub async fn check(State(state): State<AppState>, jar: CookieJar) -> Result<Json<SupportUser>, ApiError> {
    let staff = require_support(&state, &jar).await?;
    Ok(Json(staff.into()))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    if let Some(cookie) = jar.get(SUPPORT_SESSION_COOKIE) {
        state.support_sessions.remove(cookie.value());
    }
    let jar = jar.add(removal_cookie(SUPPORT_SESSION_COOKIE, state.settings.secure_cookies));
    (jar, Json(SuccessResponse::ok()))
}

pub async fn tickets(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    require_support(&state, &jar).await?;
    Ok(Json(state.store.support_tickets().await?))
}

/// Public contact form. A signed-in user's id is attached when present.
pub async fn open_ticket(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(ticket): ApiJson<NewTicket>,
) -> Result<Json<SupportTicket>, ApiError> {
    ticket.validate().map_err(ApiError::BadRequest)?;
    let user_id = match resolve_user(&state, &jar).await {
        Ok(user) => user.map(|user| user.id),
        Err(err) => {
            warn!(error = %err, "could not resolve user for support ticket; filing anonymously");
            None
        }
    };

    let created = state
        .store
        .create_support_ticket(user_id.as_deref(), &ticket, Utc::now())
        .await?;
    info!(ticket_id = created.id, priority = %created.priority, "support ticket received");
    Ok(Json(created))
}

pub async fn responses(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SupportResponse>>, ApiError> {
    require_support(&state, &jar).await?;
    if state.store.support_ticket(id).await?.is_none() {
        return Err(ApiError::not_found("Ticket not found"));
    }
    Ok(Json(state.store.ticket_responses(id).await?))
}

pub async fn respond(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TicketResponseRequest>,
) -> Result<Json<SupportResponse>, ApiError> {
    let staff = require_support(&state, &jar).await?;
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let response = state
        .store
        .add_ticket_response(id, &staff, message, body.is_internal, Utc::now())
        .await?;
    Ok(Json(response))
}

pub async fn set_status(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TicketStatusRequest>,
) -> Result<Json<SupportTicket>, ApiError> {
    let staff = require_support(&state, &jar).await?;
    let ticket = state.store.set_ticket_status(id, body.status, Utc::now()).await?;
    info!(ticket_id = id, status = %ticket.status, staff = %staff.username, "ticket status set");
    Ok(Json(ticket))
}

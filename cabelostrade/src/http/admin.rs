//! The admin panel, plus the user-facing side of admin messages.
//!
//! Every `/api/admin/*` handler except the console login starts from
//! [`resolve_admin`]: a console session wins, then a signed-in user with an
//! `admin_users` row.

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::policy::ReviewKind;
use crate::store::{
    AdminMessage, AdminMessageView, AdminUser, ChatMessageView, ConversationOverview, FeaturedProduct,
    MarketStats, ModerationReview, ProductWithSeller, ProfileWithStatus, Transaction,
};

use super::auth::{
    all_permissions, console_admin_id, removal_cookie, require_active_user, require_user,
    resolve_admin, session_cookie, to_cookie_max_age, ADMIN_SESSION_COOKIE, SUPER_ADMIN_ROLE,
};
use super::error::{ApiError, ApiJson, ApiQuery};
use super::responses::{
    AdminActionRequest, AdminCheckResponse, AdminMessageSent, AdminSendMessageRequest,
    AdminSetupRequest, FeatureProductRequest, LoginRequest, ReviewKindQuery, SuccessResponse,
};
use super::state::AppState;

const DEFAULT_ADMIN_MESSAGE_TYPE: &str = "general";

pub async fn inbox(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<AdminMessageView>>, ApiError> {
    let user = require_user(&state, &jar).await?;
    Ok(Json(state.store.admin_messages_for(&user.id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user = require_user(&state, &jar).await?;
    if !state.store.mark_admin_message_read(id, &user.id).await? {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(Json(SuccessResponse::ok()))
}

/// Console login against the configured admin accounts.
pub async fn direct_login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<SuccessResponse>), ApiError> {
    let username = body.username.trim();
    if !state.credentials.is_admin_authorized(username, &body.password) {
        warn!(username, "admin console login refused");
        return Err(ApiError::Unauthorized);
    }

    let permissions = all_permissions().to_string();
    state
        .store
        .ensure_admin_user(&console_admin_id(username), SUPER_ADMIN_ROLE, &permissions, Utc::now())
        .await?;

    let token = state.admin_sessions.create(username.to_string());
    let cookie = session_cookie(
        ADMIN_SESSION_COOKIE,
        token,
        to_cookie_max_age(state.admin_sessions.ttl()),
        state.settings.secure_cookies,
    );
    info!(username, "admin console login");
    Ok((jar.add(cookie), Json(SuccessResponse::with_message("Login successful"))))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    if let Some(cookie) = jar.get(ADMIN_SESSION_COOKIE) {
        state.admin_sessions.remove(cookie.value());
    }
    let jar = jar.add(removal_cookie(ADMIN_SESSION_COOKIE, state.settings.secure_cookies));
    (jar, Json(SuccessResponse::ok()))
}

/// Redeems a one-time setup key for the signed-in user.
pub async fn setup(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<AdminSetupRequest>,
) -> Result<Json<AdminUser>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    let permissions = all_permissions().to_string();
    let admin = state
        .store
        .redeem_setup_key(body.setup_key.trim(), &user.id, &permissions, Utc::now())
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or already used setup key"))?;
    Ok(Json(admin))
}

pub async fn check(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<AdminCheckResponse>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    Ok(Json(AdminCheckResponse {
        role: admin.role,
        permissions: admin.permissions,
    }))
}

pub async fn stats(State(state): State<AppState>, jar: CookieJar) -> Result<Json<MarketStats>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.market_stats().await?))
}

pub async fn users(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<ProfileWithStatus>>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.list_profiles(Utc::now()).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(user_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    state.store.delete_user(&user_id).await?;
    info!(admin_id = %admin.admin_id, user_id = %user_id, "user deleted");
    Ok(Json(SuccessResponse::with_message("User deleted successfully")))
}

pub async fn action(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<AdminActionRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    let target = body.target_user_id.trim();
    if target.is_empty() {
        return Err(ApiError::bad_request("target_user_id is required"));
    }
    let recorded = state
        .store
        .record_admin_action(
            &admin.admin_id,
            target,
            body.action_type,
            body.reason.as_deref(),
            body.notes.as_deref(),
            Utc::now(),
        )
        .await?;
    Ok(Json(SuccessResponse::with_message(format!(
        "Action {} completed",
        recorded.action_type
    ))))
}

pub async fn products(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<ProductWithSeller>>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.all_products().await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    if !state.store.delete_product(id).await? {
        return Err(ApiError::not_found("Product not found"));
    }
    info!(admin_id = %admin.admin_id, product_id = id, "product removed by admin");
    Ok(Json(SuccessResponse::with_message("Product deleted successfully")))
}

pub async fn reviews(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<ModerationReview>>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.moderation_reviews().await?))
}

/// `?type=` picks the review table; transaction reviews when absent.
pub async fn delete_review(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<ReviewKindQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    let kind = query.kind.unwrap_or(ReviewKind::Transaction);
    if !state.store.delete_review(kind, id).await? {
        return Err(ApiError::not_found("Review not found"));
    }
    info!(admin_id = %admin.admin_id, review_id = id, kind = %kind, "review removed by admin");
    Ok(Json(SuccessResponse::with_message("Review deleted successfully")))
}

pub async fn feature_product(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<FeatureProductRequest>,
) -> Result<Json<FeaturedProduct>, ApiError> {
    resolve_admin(&state, &jar).await?;
    if body.duration_days <= 0 {
        return Err(ApiError::bad_request("duration_days must be positive"));
    }
    if body.price_cents < 0 {
        return Err(ApiError::bad_request("price_cents cannot be negative"));
    }
    let product = state
        .store
        .product(body.product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let now = Utc::now();
    let expires_at = Duration::try_days(body.duration_days)
        .and_then(|days| now.checked_add_signed(days))
        .ok_or_else(|| ApiError::bad_request("duration_days is too large"))?;
    let featured = state
        .store
        .create_featured(&product, body.featured_type, body.price_cents, expires_at, now)
        .await?;
    info!(
        product_id = product.id,
        featured_type = %body.featured_type,
        %expires_at,
        "product featured"
    );
    Ok(Json(featured))
}

pub async fn release_escrow(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    let transaction = state
        .store
        .transaction(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    if transaction.escrow_released {
        return Err(ApiError::bad_request("Escrow already released"));
    }
    transaction
        .status
        .release_escrow()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let released = state.store.release_escrow(id, &admin.admin_id, Utc::now()).await?;
    info!(admin_id = %admin.admin_id, transaction_id = id, "escrow released");
    Ok(Json(released))
}

pub async fn conversations(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<ConversationOverview>>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.all_conversations().await?))
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ChatMessageView>>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.conversation_messages(id).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<AdminSendMessageRequest>,
) -> Result<Json<AdminMessageSent<AdminMessage>>, ApiError> {
    let admin = resolve_admin(&state, &jar).await?;
    let user_id = body.user_id.trim();
    let text = body.message.trim();
    if user_id.is_empty() || text.is_empty() {
        return Err(ApiError::bad_request("user_id and message are required"));
    }
    let message_type = body
        .message_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_ADMIN_MESSAGE_TYPE);

    let message = state
        .store
        .send_admin_message(
            &admin.admin_id,
            user_id,
            body.subject.as_deref(),
            text,
            message_type,
            Utc::now(),
        )
        .await?;
    Ok(Json(AdminMessageSent {
        success: true,
        message,
    }))
}

/// Everything the admins have sent to one user.
pub async fn user_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AdminMessageView>>, ApiError> {
    resolve_admin(&state, &jar).await?;
    Ok(Json(state.store.admin_messages_for(&user_id).await?))
}

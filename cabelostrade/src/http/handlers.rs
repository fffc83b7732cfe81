use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, Method, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::identity::IdentityUser;

use super::auth::{removal_cookie, require_user, user_session_cookie, USER_SESSION_COOKIE};
use super::error::{ApiError, ApiJson};
use super::responses::{CreateSessionRequest, HealthResponse, RedirectUrlResponse, SuccessResponse};
use super::state::AppState;
use super::{admin, chat, products, profiles, reviews, support, transactions, uploads};

/// Multipart framing allowance on top of the configured upload limit.
const UPLOAD_BODY_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let upload_limit = state.settings.max_upload_bytes + UPLOAD_BODY_OVERHEAD;

    let api = Router::new()
        .route("/api/health", get(health))
        .route("/api/oauth/google/redirect_url", get(google_redirect_url))
        .route("/api/sessions", post(create_session))
        .route("/api/users/me", get(current_user))
        .route("/api/logout", get(logout))
        .route("/api/profile", get(profiles::own_profile).put(profiles::update_profile))
        .route("/api/public-profile/{user_id}", get(profiles::public_profile))
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/images", post(products::add_image))
        .route(
            "/api/products/{id}",
            get(products::detail).put(products::update).delete(products::remove),
        )
        .route("/api/products/{id}/like", post(products::toggle_like))
        .route("/api/products/{id}/like-status", get(products::like_status))
        .route(
            "/api/upload",
            post(uploads::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/images/{id}", get(uploads::image))
        .route("/api/transactions", get(transactions::list).post(transactions::create))
        .route("/api/transactions/{id}/updates", get(transactions::updates))
        .route("/api/transactions/{id}/status", put(transactions::change_status))
        .route("/api/transactions/{id}/reviews", post(reviews::review_transaction))
        .route("/api/profile-reviews", post(reviews::review_profile))
        .route("/api/review-responses", post(reviews::respond))
        .route("/api/chat/conversations", get(chat::conversations).post(chat::open))
        .route(
            "/api/chat/conversations/{id}/messages",
            get(chat::messages).post(chat::send),
        )
        .route("/api/admin-messages", get(admin::inbox))
        .route("/api/admin-messages/{id}/read", post(admin::mark_read))
        .route("/api/admin/direct-login", post(admin::direct_login))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/admin/setup", post(admin::setup))
        .route("/api/admin/check", get(admin::check))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/users", get(admin::users))
        .route("/api/admin/users/{id}", delete(admin::delete_user))
        .route("/api/admin/actions", post(admin::action))
        .route("/api/admin/products", get(admin::products))
        .route("/api/admin/products/{id}", delete(admin::delete_product))
        .route("/api/admin/reviews", get(admin::reviews))
        .route("/api/admin/reviews/{id}", delete(admin::delete_review))
        .route("/api/admin/featured-products", post(admin::feature_product))
        .route(
            "/api/admin/transactions/{id}/release-escrow",
            post(admin::release_escrow),
        )
        .route("/api/admin/conversations", get(admin::conversations))
        .route(
            "/api/admin/conversations/{id}/messages",
            get(admin::conversation_messages),
        )
        .route("/api/admin/send-message", post(admin::send_message))
        .route(
            "/api/admin/user-conversations/{user_id}",
            get(admin::user_conversation),
        )
        .route("/api/support/login", post(support::login))
        .route("/api/support/check", get(support::check))
        .route("/api/support/logout", post(support::logout))
        .route("/api/support/tickets", get(support::tickets).post(support::open_ticket))
        .route(
            "/api/support/tickets/{id}/responses",
            get(support::responses).post(support::respond),
        )
        .route("/api/support/tickets/{id}/status", put(support::set_status))
        .fallback(not_found);

    let api = match GovernorConfigBuilder::default()
        .per_millisecond(50)
        .burst_size(100)
        .key_extractor(GlobalKeyExtractor)
        .finish()
    {
        Some(config) => api.layer(GovernorLayer::new(Arc::new(config))),
        None => {
            warn!("invalid rate limit configuration; serving without a rate limit");
            api
        }
    };

    let request_id = HeaderName::from_static("x-request-id");
    api.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any),
    )
    .layer(tower_http::request_id::SetRequestIdLayer::new(
        request_id.clone(),
        tower_http::request_id::MakeRequestUuid,
    ))
    .layer(tower_http::request_id::PropagateRequestIdLayer::new(request_id))
    .layer(tower_http::trace::TraceLayer::new_for_http())
    .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: Some("connected"),
                error: None,
            }),
        ),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error",
                    database: None,
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

async fn google_redirect_url(
    State(state): State<AppState>,
) -> Result<Json<RedirectUrlResponse>, ApiError> {
    let redirect_url = state.identity.redirect_url("google").await?;
    Ok(Json(RedirectUrlResponse { redirect_url }))
}

async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<CreateSessionRequest>,
) -> Result<(CookieJar, Json<SuccessResponse>), ApiError> {
    let code = body
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("No authorization code provided"))?;

    let token = state.identity.exchange_code(code).await?;
    info!("user session created");
    let jar = jar.add(user_session_cookie(token, state.settings.secure_cookies));
    Ok((jar, Json(SuccessResponse::ok())))
}

async fn current_user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<IdentityUser>, ApiError> {
    let user = require_user(&state, &jar).await?;
    Ok(Json(user))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    if let Some(token) = jar.get(USER_SESSION_COOKIE).map(|cookie| cookie.value().to_string()) {
        if let Err(err) = state.identity.delete_session(&token).await {
            warn!(error = %err, "failed to delete identity session; clearing cookie anyway");
        } else {
            debug!("identity session deleted");
        }
    }
    let jar = jar.add(removal_cookie(USER_SESSION_COOKIE, state.settings.secure_cookies));
    (jar, Json(SuccessResponse::ok()))
}

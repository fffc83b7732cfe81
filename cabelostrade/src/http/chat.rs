use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::debug;

use crate::store::{ChatMessage, ChatMessageView, Conversation, ConversationSummary};

use super::auth::{require_active_user, require_user};
use super::error::{ApiError, ApiJson};
use super::responses::{OpenConversationRequest, SendMessageRequest};
use super::state::AppState;

const DEFAULT_MESSAGE_TYPE: &str = "text";

pub async fn conversations(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let user = require_user(&state, &jar).await?;
    Ok(Json(state.store.user_conversations(&user.id).await?))
}

/// Returns the buyer's conversation with the seller about a product, opening
/// it on first contact.
pub async fn open(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<OpenConversationRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    let product = state
        .store
        .product(body.product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    if product.seller_id == user.id {
        return Err(ApiError::bad_request("Cannot start a conversation about your own product"));
    }

    let (conversation, created) = state
        .store
        .open_conversation(
            &user.id,
            &product.seller_id,
            product.id,
            body.initial_message.as_deref(),
            Utc::now(),
        )
        .await?;
    debug!(conversation_id = conversation.id, created, "conversation resolved");
    Ok(Json(conversation))
}

pub async fn messages(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ChatMessageView>>, ApiError> {
    let user = require_user(&state, &jar).await?;
    if state.store.conversation_for(id, &user.id).await?.is_none() {
        return Err(ApiError::not_found("Conversation not found or unauthorized"));
    }
    let messages = state.store.conversation_messages(id).await?;
    let marked = state.store.mark_conversation_read(id, &user.id).await?;
    if marked > 0 {
        debug!(conversation_id = id, marked, "messages marked read");
    }
    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<Json<ChatMessage>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    if state.store.conversation_for(id, &user.id).await?.is_none() {
        return Err(ApiError::not_found("Conversation not found or unauthorized"));
    }
    let image_url = body.image_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let text = body.message.trim();
    if text.is_empty() && image_url.is_none() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let message_type = body
        .message_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_MESSAGE_TYPE);

    let message = state
        .store
        .send_chat_message(id, &user.id, text, message_type, image_url, Utc::now())
        .await?;
    Ok(Json(message))
}

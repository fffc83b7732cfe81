use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{info, warn};

use crate::policy::Party;
use crate::store::{Transaction, TransactionUpdate, TransactionView};

use super::auth::{require_active_user, require_user};
use super::error::{ApiError, ApiJson};
use super::responses::{CreateTransactionRequest, TransactionStatusRequest};
use super::state::AppState;

/// Transaction `id` if `user_id` is its buyer or seller.
pub(super) async fn participant_transaction(
    state: &AppState,
    id: i64,
    user_id: &str,
) -> Result<Transaction, ApiError> {
    state
        .store
        .transaction(id)
        .await?
        .filter(|t| t.buyer_id == user_id || t.seller_id == user_id)
        .ok_or_else(|| ApiError::not_found("Transaction not found or unauthorized"))
}

pub async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<CreateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    let product = state
        .store
        .product(body.product_id)
        .await?
        .filter(|product| product.is_available)
        .ok_or_else(|| ApiError::not_found("Product not found or not available"))?;
    if product.seller_id == user.id {
        return Err(ApiError::bad_request("Cannot buy your own product"));
    }

    let transaction = state
        .store
        .create_transaction(
            &user.id,
            &product,
            body.payment_method.as_deref(),
            body.notes.as_deref(),
            Utc::now(),
        )
        .await?;
    info!(
        transaction_id = transaction.id,
        product_id = product.id,
        buyer_id = %user.id,
        "purchase started"
    );
    Ok(Json(transaction))
}

pub async fn list(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let user = require_user(&state, &jar).await?;
    Ok(Json(state.store.user_transactions(&user.id).await?))
}

pub async fn updates(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TransactionUpdate>>, ApiError> {
    let user = require_user(&state, &jar).await?;
    participant_transaction(&state, id, &user.id).await?;
    Ok(Json(state.store.transaction_updates(id).await?))
}

pub async fn change_status(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TransactionStatusRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    let transaction = participant_transaction(&state, id, &user.id).await?;
    let party = if transaction.buyer_id == user.id {
        Party::Buyer
    } else {
        Party::Seller
    };

    let next = transaction
        .status
        .transition(party, body.status)
        .map_err(|err| {
            warn!(transaction_id = id, user_id = %user.id, error = %err, "status change refused");
            ApiError::BadRequest(err.to_string())
        })?;

    let updated = state
        .store
        .set_transaction_status(
            id,
            transaction.status,
            next,
            &user.id,
            body.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()),
            Utc::now(),
        )
        .await?;
    info!(transaction_id = id, status = %updated.status, "transaction status changed");
    Ok(Json(updated))
}

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::info;

use crate::policy::valid_rating;
use crate::store::{ProfileReview, Review, ReviewResponse, StoreError};

use super::auth::require_active_user;
use super::error::{ApiError, ApiJson};
use super::responses::{ProfileReviewRequest, ReviewResponseRequest, TransactionReviewRequest};
use super::state::AppState;
use super::transactions::participant_transaction;

fn check_rating(rating: i64) -> Result<(), ApiError> {
    if valid_rating(rating) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Rating must be between 1 and 5"))
    }
}

fn trimmed(comment: Option<&str>) -> Option<&str> {
    comment.map(str::trim).filter(|c| !c.is_empty())
}

pub async fn review_transaction(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TransactionReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    check_rating(body.rating)?;
    let transaction = participant_transaction(&state, id, &user.id).await?;
    if !transaction.status.allows_review() {
        return Err(ApiError::bad_request(
            "Transaction must be delivered or completed before it can be reviewed",
        ));
    }

    let review = state
        .store
        .create_transaction_review(
            &transaction,
            &user.id,
            body.rating,
            trimmed(body.comment.as_deref()),
            Utc::now(),
        )
        .await
        .map_err(|err| match err {
            StoreError::Conflict(_) => {
                ApiError::bad_request("You have already reviewed this transaction")
            }
            other => other.into(),
        })?;
    Ok(Json(review))
}

pub async fn review_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<ProfileReviewRequest>,
) -> Result<Json<ProfileReview>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    check_rating(body.rating)?;
    if body.reviewed_id == user.id {
        return Err(ApiError::bad_request("Cannot review your own profile"));
    }
    if state.store.profile(&body.reviewed_id).await?.is_none() {
        return Err(ApiError::not_found("Profile not found"));
    }
    let review = state
        .store
        .create_profile_review(
            &user.id,
            &body.reviewed_id,
            body.rating,
            trimmed(body.comment.as_deref()),
            Utc::now(),
        )
        .await
        .map_err(|err| match err {
            StoreError::Conflict(_) => ApiError::bad_request("You have already reviewed this profile"),
            other => other.into(),
        })?;
    info!(reviewer_id = %user.id, reviewed_id = %body.reviewed_id, rating = body.rating, "profile reviewed");
    Ok(Json(review))
}

/// Only the reviewed user may answer a review.
pub async fn respond(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<ReviewResponseRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    let text = body.response_text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("Response text is required"));
    }

    let subject = state.store.review_subject(body.review_type, body.review_id).await?;
    if subject.as_deref() != Some(user.id.as_str()) {
        return Err(ApiError::forbidden("Cannot respond to this review"));
    }

    let response = state
        .store
        .create_review_response(body.review_id, body.review_type, &user.id, text, Utc::now())
        .await?;
    Ok(Json(response))
}

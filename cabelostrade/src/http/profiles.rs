use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::debug;

use crate::identity::IdentityUser;
use crate::store::{Profile, ProfileUpdate, PublicProfile};

use super::auth::require_user;
use super::error::{ApiError, ApiJson};
use super::state::AppState;

const NAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=50;
const MAX_BIO_CHARS: usize = 500;

fn display_name(user: &IdentityUser) -> &str {
    user.google_user_data
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&user.email)
}

fn validate_update(update: &ProfileUpdate) -> Result<(), ApiError> {
    if let Some(name) = &update.name {
        if !NAME_LENGTH.contains(&name.trim().chars().count()) {
            return Err(ApiError::bad_request("Name must be between 2 and 50 characters"));
        }
    }
    if update
        .bio
        .as_ref()
        .is_some_and(|bio| bio.chars().count() > MAX_BIO_CHARS)
    {
        return Err(ApiError::bad_request("Bio must be at most 500 characters"));
    }
    Ok(())
}

pub async fn own_profile(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Profile>, ApiError> {
    let user = require_user(&state, &jar).await?;
    let profile = state
        .store
        .ensure_profile(&user.id, Some(display_name(&user)), Utc::now())
        .await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    let user = require_user(&state, &jar).await?;
    validate_update(&update)?;

    let now = Utc::now();
    state
        .store
        .ensure_profile(&user.id, Some(display_name(&user)), now)
        .await?;
    let profile = state.store.update_profile(&user.id, &update, now).await?;
    debug!(user_id = %user.id, "profile updated");
    Ok(Json(profile))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    let profile = state
        .store
        .profile(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let products = state.store.seller_products(&user_id).await?;
    let reviews_received = state.store.received_reviews(&user_id).await?;
    let profile_reviews = state.store.received_profile_reviews(&user_id).await?;
    let is_blocked = state.store.is_blocked(&user_id, Utc::now()).await?;

    Ok(Json(PublicProfile {
        profile,
        products,
        reviews_received,
        profile_reviews,
        is_blocked,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::validate_update;
    use crate::store::ProfileUpdate;

    #[test]
    fn name_and_bio_limits_apply_only_when_present() {
        assert!(validate_update(&ProfileUpdate::default()).is_ok());

        let short_name = ProfileUpdate {
            name: Some(String::from("A")),
            ..ProfileUpdate::default()
        };
        assert!(validate_update(&short_name).is_err());

        let long_bio = ProfileUpdate {
            bio: Some("x".repeat(501)),
            ..ProfileUpdate::default()
        };
        assert!(validate_update(&long_bio).is_err());
    }
}

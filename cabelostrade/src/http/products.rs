use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{debug, info};

use crate::policy::{can_edit, clamp_page};
use crate::store::{Product, ProductFilter, ProductImage, ProductInput, ProductListing};

use super::auth::{require_active_user, require_user, resolve_user};
use super::error::{ApiError, ApiJson, ApiQuery};
use super::responses::{
    AddImageRequest, LikeResponse, ProductDetailResponse, ProductQuery, SuccessResponse,
};
use super::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<ProductListing>>, ApiError> {
    let (limit, offset) = clamp_page(query.page, query.limit);
    let filter = ProductFilter {
        search: query.search,
        hair_type: query.hair_type,
        hair_color: query.hair_color,
        hair_origin: query.hair_origin,
    };
    let listings = state
        .store
        .list_products(&filter, limit, offset, Utc::now())
        .await?;
    Ok(Json(listings))
}

/// Product page. `can_edit` is only ever true for the seller, inside the edit window.
pub async fn detail(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<ProductDetailResponse>, ApiError> {
    let product = state
        .store
        .product_with_seller(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    let images = state.store.product_images(id).await?;

    let viewer = resolve_user(&state, &jar).await?;
    let editable = viewer.is_some_and(|user| {
        user.id == product.product.seller_id
            && can_edit(product.product.created_at, Utc::now(), state.settings.edit_window)
    });

    Ok(Json(ProductDetailResponse {
        product,
        images,
        can_edit: editable,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    if !state.store.is_seller(&user.id).await? {
        return Err(ApiError::forbidden("User must be a seller to create products"));
    }
    input.validate().map_err(ApiError::BadRequest)?;

    let product = state.store.create_product(&user.id, &input, Utc::now()).await?;
    info!(product_id = product.id, seller_id = %user.id, "product listed");
    Ok(Json(product))
}

/// Loads `id` if `user_id` is its seller.
async fn owned_product(state: &AppState, id: i64, user_id: &str) -> Result<Option<Product>, ApiError> {
    Ok(state
        .store
        .product(id)
        .await?
        .filter(|product| product.seller_id == user_id))
}

pub async fn update(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    let existing = owned_product(&state, id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found or unauthorized"))?;

    let now = Utc::now();
    if !can_edit(existing.created_at, now, state.settings.edit_window) {
        return Err(ApiError::forbidden(format!(
            "Product can only be edited within {} minutes of creation",
            state.settings.edit_window.num_minutes()
        )));
    }
    input.validate().map_err(ApiError::BadRequest)?;

    let product = state.store.update_product(id, &user.id, &input, now).await?;
    debug!(product_id = id, "product updated");
    Ok(Json(product))
}

pub async fn remove(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user = require_user(&state, &jar).await?;
    if owned_product(&state, id, &user.id).await?.is_none() {
        return Err(ApiError::not_found("Product not found or unauthorized"));
    }
    state.store.delete_product(id).await?;
    info!(product_id = id, seller_id = %user.id, "product removed by seller");
    Ok(Json(SuccessResponse::with_message("Product deleted successfully")))
}

pub async fn add_image(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<AddImageRequest>,
) -> Result<Json<ProductImage>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    if owned_product(&state, body.product_id, &user.id).await?.is_none() {
        return Err(ApiError::forbidden("Product not found or unauthorized"));
    }
    if body.image_url.trim().is_empty() {
        return Err(ApiError::bad_request("image_url is required"));
    }
    let image = state
        .store
        .add_product_image(body.product_id, body.image_url.trim(), body.display_order, Utc::now())
        .await?;
    Ok(Json(image))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<LikeResponse>, ApiError> {
    let user = require_active_user(&state, &jar).await?;
    if state.store.product(id).await?.is_none() {
        return Err(ApiError::not_found("Product not found"));
    }
    let liked = state.store.toggle_like(id, &user.id, Utc::now()).await?;
    debug!(product_id = id, liked, "like toggled");
    Ok(Json(LikeResponse { liked }))
}

pub async fn like_status(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<LikeResponse>, ApiError> {
    let user = require_user(&state, &jar).await?;
    let liked = state.store.is_liked(id, &user.id).await?;
    Ok(Json(LikeResponse { liked }))
}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::policy::FeaturedType;

use super::{
    like_pattern, FeaturedProduct, Product, ProductImage, ProductListing, ProductWithSeller, Store,
    StoreError, StoreResult,
};

/// Listing filters; blank strings are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub hair_type: Option<String>,
    pub hair_color: Option<String>,
    pub hair_origin: Option<String>,
}

/// Seller-supplied listing fields, used for both create and full replace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    pub title: String,
    pub description: Option<String>,
    pub hair_type: Option<String>,
    pub hair_color: Option<String>,
    pub hair_length: Option<i64>,
    pub weight_grams: Option<i64>,
    pub hair_origin: Option<String>,
    pub hair_texture: Option<String>,
    pub price_cents: i64,
    pub main_image_url: Option<String>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), String> {
        let title_len = self.title.trim().chars().count();
        if !(3..=100).contains(&title_len) {
            return Err(String::from("title must be between 3 and 100 characters"));
        }
        if self.price_cents <= 0 {
            return Err(String::from("price_cents must be positive"));
        }
        if self.hair_length.is_some_and(|value| value <= 0) {
            return Err(String::from("hair_length must be positive"));
        }
        if self.weight_grams.is_some_and(|value| value <= 0) {
            return Err(String::from("weight_grams must be positive"));
        }
        Ok(())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Store {
    /// Available products, featured placements first, then newest.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ProductListing>> {
        let priority = FeaturedType::priority_sql("featured_type");
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT p.*, up.name AS seller_name, up.rating_avg AS seller_rating,
                    fp.featured_type AS featured_type, fp.expires_at AS featured_expires_at,
                    COALESCE(fp.priority, 0) AS featured_priority
             FROM products p
             LEFT JOIN user_profiles up ON p.seller_id = up.user_id
             LEFT JOIN (
                 SELECT product_id, featured_type, expires_at, priority FROM (
                     SELECT product_id, featured_type, expires_at, {priority} AS priority,
                            ROW_NUMBER() OVER (
                                PARTITION BY product_id ORDER BY {priority} DESC, expires_at DESC
                            ) AS rn
                     FROM featured_products
                     WHERE is_active = 1 AND expires_at > "
        ));
        query.push_bind(now);
        query.push(
            ") WHERE rn = 1
             ) fp ON fp.product_id = p.id
             WHERE p.is_available = 1",
        );

        if let Some(search) = non_blank(&filter.search) {
            let pattern = like_pattern(search);
            query.push(" AND (p.title LIKE ");
            query.push_bind(pattern.clone());
            query.push(" ESCAPE '\\' OR p.description LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\')");
        }
        if let Some(hair_type) = non_blank(&filter.hair_type) {
            query.push(" AND p.hair_type = ");
            query.push_bind(hair_type.to_string());
        }
        if let Some(hair_color) = non_blank(&filter.hair_color) {
            query.push(" AND p.hair_color = ");
            query.push_bind(hair_color.to_string());
        }
        if let Some(hair_origin) = non_blank(&filter.hair_origin) {
            query.push(" AND p.hair_origin = ");
            query.push_bind(hair_origin.to_string());
        }

        query.push(" ORDER BY featured_priority DESC, p.created_at DESC, p.id DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let listings = query
            .build_query_as::<ProductListing>()
            .fetch_all(&self.pool)
            .await?;
        debug!(results = listings.len(), limit, offset, "products listed");
        Ok(listings)
    }

    pub async fn product(&self, id: i64) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn product_with_seller(&self, id: i64) -> StoreResult<Option<ProductWithSeller>> {
        let product = sqlx::query_as::<_, ProductWithSeller>(
            "SELECT p.*, up.name AS seller_name, up.rating_avg AS seller_rating,
                    up.rating_count AS rating_count
             FROM products p
             LEFT JOIN user_profiles up ON p.seller_id = up.user_id
             WHERE p.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn product_images(&self, product_id: i64) -> StoreResult<Vec<ProductImage>> {
        let images = sqlx::query_as::<_, ProductImage>(
            "SELECT * FROM product_images WHERE product_id = ? ORDER BY display_order, id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    pub async fn seller_products(&self, seller_id: &str) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE seller_id = ? AND is_available = 1 ORDER BY created_at DESC",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Every product regardless of availability, for moderation.
    pub async fn all_products(&self) -> StoreResult<Vec<ProductWithSeller>> {
        let products = sqlx::query_as::<_, ProductWithSeller>(
            "SELECT p.*, up.name AS seller_name, up.rating_avg AS seller_rating,
                    up.rating_count AS rating_count
             FROM products p
             LEFT JOIN user_profiles up ON p.seller_id = up.user_id
             ORDER BY p.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn create_product(
        &self,
        seller_id: &str,
        input: &ProductInput,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (seller_id, title, description, hair_type, hair_color, hair_length,
                                   weight_grams, hair_origin, hair_texture, price_cents, main_image_url,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(seller_id)
        .bind(input.title.trim())
        .bind(input.description.as_deref())
        .bind(input.hair_type.as_deref())
        .bind(input.hair_color.as_deref())
        .bind(input.hair_length)
        .bind(input.weight_grams)
        .bind(input.hair_origin.as_deref())
        .bind(input.hair_texture.as_deref())
        .bind(input.price_cents)
        .bind(input.main_image_url.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(product_id = product.id, seller_id, "product created");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: i64,
        seller_id: &str,
        input: &ProductInput,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        sqlx::query_as::<_, Product>(
            "UPDATE products
             SET title = ?, description = ?, hair_type = ?, hair_color = ?, hair_length = ?,
                 weight_grams = ?, hair_origin = ?, hair_texture = ?, price_cents = ?,
                 main_image_url = ?, updated_at = ?
             WHERE id = ? AND seller_id = ?
             RETURNING *",
        )
        .bind(input.title.trim())
        .bind(input.description.as_deref())
        .bind(input.hair_type.as_deref())
        .bind(input.hair_color.as_deref())
        .bind(input.hair_length)
        .bind(input.weight_grams)
        .bind(input.hair_origin.as_deref())
        .bind(input.hair_texture.as_deref())
        .bind(input.price_cents)
        .bind(input.main_image_url.as_deref())
        .bind(now)
        .bind(id)
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("product"))
    }

    /// Deletes a product together with its images, likes and featured rows.
    pub async fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        for statement in [
            "DELETE FROM product_images WHERE product_id = ?",
            "DELETE FROM product_likes WHERE product_id = ?",
            "DELETE FROM featured_products WHERE product_id = ?",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }
        let deleted = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        debug!(product_id = id, deleted, "product deleted");
        Ok(deleted > 0)
    }

    pub async fn add_product_image(
        &self,
        product_id: i64,
        image_url: &str,
        display_order: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<ProductImage> {
        let image = sqlx::query_as::<_, ProductImage>(
            "INSERT INTO product_images (product_id, image_url, display_order, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(product_id)
        .bind(image_url)
        .bind(display_order)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(image)
    }

    /// Flips the caller's like and keeps `like_count` in step. Returns the new state.
    pub async fn toggle_like(
        &self,
        product_id: i64,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM product_likes WHERE product_id = ? AND user_id = ?")
            .bind(product_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if removed {
            sqlx::query(
                "UPDATE products SET like_count = like_count - 1 WHERE id = ? AND like_count > 0",
            )
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("INSERT INTO product_likes (product_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(product_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE products SET like_count = like_count + 1 WHERE id = ?")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(!removed)
    }

    pub async fn is_liked(&self, product_id: i64, user_id: &str) -> StoreResult<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM product_likes WHERE product_id = ? AND user_id = ?)",
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(liked)
    }

    pub async fn create_featured(
        &self,
        product: &Product,
        featured_type: FeaturedType,
        price_paid_cents: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<FeaturedProduct> {
        let featured = sqlx::query_as::<_, FeaturedProduct>(
            "INSERT INTO featured_products (product_id, seller_id, featured_type, price_paid_cents,
                                            expires_at, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)
             RETURNING *",
        )
        .bind(product.id)
        .bind(&product.seller_id)
        .bind(featured_type)
        .bind(price_paid_cents)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(
            product_id = product.id,
            featured_type = %featured_type,
            expires_at = %expires_at,
            "featured placement created"
        );
        Ok(featured)
    }
}

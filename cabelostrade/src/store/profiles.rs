use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::policy::average_rating;

use super::{Profile, ProfileWithStatus, Store, StoreError, StoreResult};

/// Partial profile update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub whatsapp_number: Option<String>,
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub is_seller: Option<bool>,
}

impl Store {
    pub async fn profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Returns the caller's profile, creating a buyer profile on first access.
    pub async fn ensure_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Profile> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, name, is_seller, is_buyer, created_at, updated_at)
             VALUES (?, ?, 0, 1, ?, ?)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.profile(user_id)
            .await?
            .ok_or(StoreError::NotFound("profile"))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(
            "UPDATE user_profiles
             SET name = COALESCE(?, name),
                 phone = COALESCE(?, phone),
                 location = COALESCE(?, location),
                 bio = COALESCE(?, bio),
                 whatsapp_number = COALESCE(?, whatsapp_number),
                 business_name = COALESCE(?, business_name),
                 business_type = COALESCE(?, business_type),
                 is_seller = COALESCE(?, is_seller),
                 updated_at = ?
             WHERE user_id = ?
             RETURNING *",
        )
        .bind(update.name.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.location.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.whatsapp_number.as_deref())
        .bind(update.business_name.as_deref())
        .bind(update.business_type.as_deref())
        .bind(update.is_seller)
        .bind(now)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("profile"))
    }

    pub async fn is_seller(&self, user_id: &str) -> StoreResult<bool> {
        let seller: Option<bool> =
            sqlx::query_scalar("SELECT is_seller FROM user_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(seller.unwrap_or(false))
    }

    /// Recomputes `rating_avg`/`rating_count` from visible profile reviews and
    /// transaction reviews the user received.
    pub async fn refresh_rating(&self, user_id: &str) -> StoreResult<(f64, i64)> {
        let ratings: Vec<i64> = sqlx::query_scalar(
            "SELECT rating FROM profile_reviews WHERE reviewed_id = ? AND is_visible = 1
             UNION ALL
             SELECT rating FROM reviews WHERE reviewed_id = ?",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let (avg, count) = average_rating(&ratings);
        sqlx::query("UPDATE user_profiles SET rating_avg = ?, rating_count = ? WHERE user_id = ?")
            .bind(avg)
            .bind(count)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        debug!(user_id, rating_avg = avg, rating_count = count, "rating refreshed");
        Ok((avg, count))
    }

    /// All profiles with their current block status, newest first.
    pub async fn list_profiles(&self, now: DateTime<Utc>) -> StoreResult<Vec<ProfileWithStatus>> {
        let profiles = sqlx::query_as::<_, ProfileWithStatus>(
            "SELECT up.*,
                    EXISTS (
                        SELECT 1 FROM blocked_users bu
                        WHERE bu.user_id = up.user_id AND (bu.expires_at IS NULL OR bu.expires_at > ?)
                    ) AS is_blocked
             FROM user_profiles up
             ORDER BY up.created_at DESC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(profiles)
    }

    pub async fn is_blocked(&self, user_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let blocked: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM blocked_users
                WHERE user_id = ? AND (expires_at IS NULL OR expires_at > ?)
             )",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(blocked)
    }

    /// Removes every row owned by or pointing at `user_id`, children first,
    /// then refreshes the ratings of everyone the user had reviewed.
    pub async fn delete_user(&self, user_id: &str) -> StoreResult<()> {
        let statements = [
            "DELETE FROM product_likes WHERE user_id = ?1",
            "DELETE FROM review_responses WHERE responder_id = ?1
                OR (review_type = 'profile' AND review_id IN
                    (SELECT id FROM profile_reviews WHERE reviewer_id = ?1 OR reviewed_id = ?1))
                OR (review_type = 'transaction' AND review_id IN
                    (SELECT id FROM reviews WHERE reviewer_id = ?1 OR reviewed_id = ?1))",
            "DELETE FROM profile_reviews WHERE reviewer_id = ?1 OR reviewed_id = ?1",
            "DELETE FROM reviews WHERE reviewer_id = ?1 OR reviewed_id = ?1",
            "DELETE FROM chat_messages WHERE sender_id = ?1
                OR conversation_id IN (SELECT id FROM chat_conversations WHERE buyer_id = ?1 OR seller_id = ?1)",
            "DELETE FROM chat_conversations WHERE buyer_id = ?1 OR seller_id = ?1",
            "DELETE FROM transaction_updates WHERE transaction_id IN
                (SELECT id FROM transactions WHERE buyer_id = ?1 OR seller_id = ?1)",
            "DELETE FROM transactions WHERE buyer_id = ?1 OR seller_id = ?1",
            "DELETE FROM product_images WHERE product_id IN (SELECT id FROM products WHERE seller_id = ?1)",
            "DELETE FROM product_likes WHERE product_id IN (SELECT id FROM products WHERE seller_id = ?1)",
            "DELETE FROM featured_products WHERE seller_id = ?1",
            "DELETE FROM products WHERE seller_id = ?1",
            "DELETE FROM uploaded_images WHERE user_id = ?1",
            "DELETE FROM admin_messages WHERE user_id = ?1",
            "DELETE FROM admin_conversations WHERE user_id = ?1",
            "DELETE FROM blocked_users WHERE user_id = ?1",
            "DELETE FROM admin_actions WHERE target_user_id = ?1",
            "DELETE FROM user_profiles WHERE user_id = ?1",
        ];

        let mut tx = self.pool.begin().await?;
        let reviewed: Vec<String> = sqlx::query_scalar(
            "SELECT reviewed_id FROM profile_reviews WHERE reviewer_id = ?1 AND reviewed_id != ?1
             UNION
             SELECT reviewed_id FROM reviews WHERE reviewer_id = ?1 AND reviewed_id != ?1",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        for statement in statements {
            sqlx::query(statement).bind(user_id).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        for reviewed_id in &reviewed {
            self.refresh_rating(reviewed_id).await?;
        }
        debug!(user_id, ratings_refreshed = reviewed.len(), "user data deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;

    use super::ProfileUpdate;
    use crate::policy::ReviewKind;
    use crate::store::Store;

    #[tokio::test]
    async fn ensure_profile_creates_buyer_once() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();

        let first = store.ensure_profile("u1", Some("Ana"), now).await.unwrap();
        let second = store.ensure_profile("u1", Some("Other"), now).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Ana"));
        assert!(second.is_buyer);
        assert!(!second.is_seller);
    }

    #[tokio::test]
    async fn update_profile_keeps_absent_fields() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("u1", Some("Ana"), now).await.unwrap();

        let updated = store
            .update_profile(
                "u1",
                &ProfileUpdate {
                    bio: Some(String::from("cabelos naturais")),
                    is_seller: Some(true),
                    ..ProfileUpdate::default()
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Ana"));
        assert_eq!(updated.bio.as_deref(), Some("cabelos naturais"));
        assert!(updated.is_seller);
        assert!(store.is_seller("u1").await.unwrap());
        assert!(!store.is_seller("missing").await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_reviewer_refreshes_the_reviewed_rating() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("seller", Some("Seller"), now).await.unwrap();
        store.ensure_profile("ana", Some("Ana"), now).await.unwrap();
        store.ensure_profile("bia", Some("Bia"), now).await.unwrap();

        let harsh = store
            .create_profile_review("ana", "seller", 1, None, now)
            .await
            .unwrap();
        store
            .create_profile_review("bia", "seller", 5, None, now)
            .await
            .unwrap();
        store
            .create_review_response(harsh.id, ReviewKind::Profile, "seller", "sinto muito", now)
            .await
            .unwrap();

        store.delete_user("ana").await.unwrap();

        let seller = store.profile("seller").await.unwrap().unwrap();
        assert_eq!(seller.rating_count, 1);
        assert!((seller.rating_avg - 5.0).abs() < f64::EPSILON);
        assert!(store.review_subject(ReviewKind::Profile, harsh.id).await.unwrap().is_none());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_responses")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}

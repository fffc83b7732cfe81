use chrono::{DateTime, Utc};
use tracing::debug;

use crate::policy::ReviewKind;

use super::{
    ModerationReview, ProfileReview, ReceivedProfileReview, ReceivedReview, Review,
    ReviewResponse, ReviewResponseView, Store, StoreError, StoreResult, Transaction,
};

impl Store {
    /// Fails with [`StoreError::Conflict`] when `reviewer_id` already reviewed `reviewed_id`.
    pub async fn create_profile_review(
        &self,
        reviewer_id: &str,
        reviewed_id: &str,
        rating: i64,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<ProfileReview> {
        let review = sqlx::query_as::<_, ProfileReview>(
            "INSERT INTO profile_reviews (reviewer_id, reviewed_id, rating, comment, is_visible, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT (reviewer_id, reviewed_id) DO NOTHING
             RETURNING *",
        )
        .bind(reviewer_id)
        .bind(reviewed_id)
        .bind(rating)
        .bind(comment)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Conflict(String::from("you have already reviewed this profile")))?;

        self.refresh_rating(reviewed_id).await?;
        Ok(review)
    }

    /// Records the participant's review of the other side of `transaction`.
    pub async fn create_transaction_review(
        &self,
        transaction: &Transaction,
        reviewer_id: &str,
        rating: i64,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Review> {
        let (reviewed_id, review_type) = if reviewer_id == transaction.buyer_id {
            (transaction.seller_id.as_str(), "buyer_to_seller")
        } else {
            (transaction.buyer_id.as_str(), "seller_to_buyer")
        };

        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (transaction_id, reviewer_id, reviewed_id, rating, comment, review_type,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (transaction_id, reviewer_id) DO NOTHING
             RETURNING *",
        )
        .bind(transaction.id)
        .bind(reviewer_id)
        .bind(reviewed_id)
        .bind(rating)
        .bind(comment)
        .bind(review_type)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Conflict(String::from("you have already reviewed this transaction")))?;

        self.refresh_rating(reviewed_id).await?;
        debug!(transaction_id = transaction.id, reviewer_id, reviewed_id, rating, "transaction reviewed");
        Ok(review)
    }

    /// The user who received review `review_id` of the given kind.
    pub async fn review_subject(&self, kind: ReviewKind, review_id: i64) -> StoreResult<Option<String>> {
        let sql = match kind {
            ReviewKind::Profile => "SELECT reviewed_id FROM profile_reviews WHERE id = ?",
            ReviewKind::Transaction => "SELECT reviewed_id FROM reviews WHERE id = ?",
        };
        let reviewed: Option<String> = sqlx::query_scalar(sql)
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reviewed)
    }

    pub async fn create_review_response(
        &self,
        review_id: i64,
        kind: ReviewKind,
        responder_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ReviewResponse> {
        let response = sqlx::query_as::<_, ReviewResponse>(
            "INSERT INTO review_responses (review_id, review_type, responder_id, response_text, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(review_id)
        .bind(kind)
        .bind(responder_id)
        .bind(text)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(response)
    }

    async fn review_responses(&self, kind: ReviewKind, review_id: i64) -> StoreResult<Vec<ReviewResponseView>> {
        let responses = sqlx::query_as::<_, ReviewResponseView>(
            "SELECT rr.*, up.name AS responder_name
             FROM review_responses rr
             LEFT JOIN user_profiles up ON rr.responder_id = up.user_id
             WHERE rr.review_id = ? AND rr.review_type = ?
             ORDER BY rr.created_at ASC, rr.id ASC",
        )
        .bind(review_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(responses)
    }

    /// Transaction reviews the user received, with their responses.
    pub async fn received_reviews(&self, user_id: &str) -> StoreResult<Vec<ReceivedReview>> {
        let mut reviews = sqlx::query_as::<_, ReceivedReview>(
            "SELECT r.*, up.name AS reviewer_name, p.title AS product_title,
                    (SELECT COUNT(*) FROM transactions
                     WHERE buyer_id = r.reviewer_id OR seller_id = r.reviewer_id) AS reviewer_transaction_count
             FROM reviews r
             LEFT JOIN user_profiles up ON r.reviewer_id = up.user_id
             LEFT JOIN transactions t ON r.transaction_id = t.id
             LEFT JOIN products p ON t.product_id = p.id
             WHERE r.reviewed_id = ?
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for review in &mut reviews {
            review.responses = self
                .review_responses(ReviewKind::Transaction, review.review.id)
                .await?;
        }
        Ok(reviews)
    }

    /// Visible profile reviews the user received, with their responses.
    pub async fn received_profile_reviews(&self, user_id: &str) -> StoreResult<Vec<ReceivedProfileReview>> {
        let mut reviews = sqlx::query_as::<_, ReceivedProfileReview>(
            "SELECT pr.*, up.name AS reviewer_name,
                    (SELECT COUNT(*) FROM transactions
                     WHERE buyer_id = pr.reviewer_id OR seller_id = pr.reviewer_id) AS reviewer_transaction_count
             FROM profile_reviews pr
             LEFT JOIN user_profiles up ON pr.reviewer_id = up.user_id
             WHERE pr.reviewed_id = ? AND pr.is_visible = 1
             ORDER BY pr.created_at DESC, pr.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for review in &mut reviews {
            review.responses = self
                .review_responses(ReviewKind::Profile, review.review.id)
                .await?;
        }
        Ok(reviews)
    }

    /// Both review kinds merged, newest first.
    pub async fn moderation_reviews(&self) -> StoreResult<Vec<ModerationReview>> {
        let mut reviews = sqlx::query_as::<_, ModerationReview>(
            "SELECT r.id, r.transaction_id, r.reviewer_id, r.reviewed_id, r.rating, r.comment,
                    reviewer.name AS reviewer_name, reviewed.name AS reviewed_name,
                    'transaction' AS review_type_name, r.created_at
             FROM reviews r
             LEFT JOIN user_profiles reviewer ON r.reviewer_id = reviewer.user_id
             LEFT JOIN user_profiles reviewed ON r.reviewed_id = reviewed.user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let profile_reviews = sqlx::query_as::<_, ModerationReview>(
            "SELECT pr.id, NULL AS transaction_id, pr.reviewer_id, pr.reviewed_id, pr.rating, pr.comment,
                    reviewer.name AS reviewer_name, reviewed.name AS reviewed_name,
                    'profile' AS review_type_name, pr.created_at
             FROM profile_reviews pr
             LEFT JOIN user_profiles reviewer ON pr.reviewer_id = reviewer.user_id
             LEFT JOIN user_profiles reviewed ON pr.reviewed_id = reviewed.user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        reviews.extend(profile_reviews);
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    /// Deletes a review and its responses, then refreshes the subject's rating.
    /// Returns `false` when no such review exists.
    pub async fn delete_review(&self, kind: ReviewKind, review_id: i64) -> StoreResult<bool> {
        let Some(reviewed_id) = self.review_subject(kind, review_id).await? else {
            return Ok(false);
        };

        let delete_review = match kind {
            ReviewKind::Profile => "DELETE FROM profile_reviews WHERE id = ?",
            ReviewKind::Transaction => "DELETE FROM reviews WHERE id = ?",
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM review_responses WHERE review_id = ? AND review_type = ?")
            .bind(review_id)
            .bind(kind)
            .execute(&mut *tx)
            .await?;
        sqlx::query(delete_review)
            .bind(review_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.refresh_rating(&reviewed_id).await?;
        debug!(review_id, kind = %kind, "review deleted");
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::policy::ReviewKind;
    use crate::store::{Store, StoreError};

    #[tokio::test]
    async fn profile_reviews_drive_rating_and_moderation() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("seller", Some("Seller"), now).await.unwrap();
        store.ensure_profile("a", Some("Ana"), now).await.unwrap();
        store.ensure_profile("b", Some("Bia"), now).await.unwrap();

        let first = store
            .create_profile_review("a", "seller", 5, Some("ótimo"), now)
            .await
            .unwrap();
        store
            .create_profile_review("b", "seller", 2, None, now + Duration::seconds(1))
            .await
            .unwrap();

        let seller = store.profile("seller").await.unwrap().unwrap();
        assert_eq!(seller.rating_count, 2);
        assert!((seller.rating_avg - 3.5).abs() < f64::EPSILON);
        let again = store.create_profile_review("a", "seller", 1, None, now).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
        assert_eq!(store.profile("seller").await.unwrap().unwrap().rating_count, 2);

        store
            .create_review_response(first.id, ReviewKind::Profile, "seller", "obrigada!", now)
            .await
            .unwrap();
        let received = store.received_profile_reviews("seller").await.unwrap();
        assert_eq!(received.len(), 2);
        let answered = received.iter().find(|r| r.review.id == first.id).unwrap();
        assert_eq!(answered.responses.len(), 1);
        assert_eq!(answered.responses[0].responder_name.as_deref(), Some("Seller"));

        let moderation = store.moderation_reviews().await.unwrap();
        assert_eq!(moderation.len(), 2);
        assert_eq!(moderation[0].reviewer_name.as_deref(), Some("Bia"));

        assert!(store.delete_review(ReviewKind::Profile, first.id).await.unwrap());
        let seller = store.profile("seller").await.unwrap().unwrap();
        assert_eq!(seller.rating_count, 1);
        assert!((seller.rating_avg - 2.0).abs() < f64::EPSILON);
        assert!(!store.delete_review(ReviewKind::Profile, first.id).await.unwrap());
    }
}

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::policy::TransactionStatus;

use super::{Product, Store, StoreError, StoreResult, Transaction, TransactionUpdate, TransactionView};

impl Store {
    /// Opens a pending purchase of `product` at its current price.
    pub async fn create_transaction(
        &self,
        buyer_id: &str,
        product: &Product,
        payment_method: Option<&str>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let transaction = sqlx::query_as::<_, Transaction>(
            "INSERT INTO transactions (buyer_id, seller_id, product_id, amount_cents, status,
                                       payment_method, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(buyer_id)
        .bind(&product.seller_id)
        .bind(product.id)
        .bind(product.price_cents)
        .bind(TransactionStatus::Pending)
        .bind(payment_method)
        .bind(notes)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO transaction_updates (transaction_id, status, comment, updated_by, created_at)
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(transaction.id)
        .bind(TransactionStatus::Pending)
        .bind(buyer_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(
            transaction_id = transaction.id,
            product_id = product.id,
            amount_cents = transaction.amount_cents,
            "transaction created"
        );
        Ok(transaction)
    }

    pub async fn transaction(&self, id: i64) -> StoreResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transaction)
    }

    /// The user's purchases and sales, newest first.
    pub async fn user_transactions(&self, user_id: &str) -> StoreResult<Vec<TransactionView>> {
        let transactions = sqlx::query_as::<_, TransactionView>(
            "SELECT t.*, p.title AS product_title, p.main_image_url AS main_image_url,
                    buyer.name AS buyer_name, seller.name AS seller_name
             FROM transactions t
             LEFT JOIN products p ON t.product_id = p.id
             LEFT JOIN user_profiles buyer ON t.buyer_id = buyer.user_id
             LEFT JOIN user_profiles seller ON t.seller_id = seller.user_id
             WHERE t.buyer_id = ?1 OR t.seller_id = ?1
             ORDER BY t.created_at DESC, t.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(transactions)
    }

    pub async fn transaction_updates(&self, transaction_id: i64) -> StoreResult<Vec<TransactionUpdate>> {
        let updates = sqlx::query_as::<_, TransactionUpdate>(
            "SELECT * FROM transaction_updates WHERE transaction_id = ? ORDER BY created_at, id",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(updates)
    }

    /// Persists an already-validated status change and its history row.
    /// The update only applies if the row is still in `from`.
    pub async fn set_transaction_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
        updated_by: &str,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let delivered_at = (to == TransactionStatus::Delivered).then_some(now);

        let mut tx = self.pool.begin().await?;
        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions
             SET status = ?, delivery_confirmed_at = COALESCE(?, delivery_confirmed_at), updated_at = ?
             WHERE id = ? AND status = ?
             RETURNING *",
        )
        .bind(to)
        .bind(delivered_at)
        .bind(now)
        .bind(id)
        .bind(from)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::Conflict(format!("transaction is no longer {from}")))?;

        sqlx::query(
            "INSERT INTO transaction_updates (transaction_id, status, comment, updated_by, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(to)
        .bind(comment)
        .bind(updated_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(transaction_id = id, from = %from, to = %to, updated_by, "transaction status changed");
        Ok(transaction)
    }

    /// Marks escrow as released, completes a delivered transaction and credits
    /// the seller's sales and buyer's purchases.
    pub async fn release_escrow(
        &self,
        id: i64,
        admin_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions
             SET status = ?, escrow_released = 1, admin_released_at = ?, updated_at = ?
             WHERE id = ? AND status = ? AND escrow_released = 0
             RETURNING *",
        )
        .bind(TransactionStatus::Completed)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(TransactionStatus::Delivered)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::Conflict(String::from("transaction is not awaiting escrow release")))?;

        sqlx::query("UPDATE user_profiles SET total_sales = total_sales + 1 WHERE user_id = ?")
            .bind(&transaction.seller_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE user_profiles SET total_purchases = total_purchases + 1 WHERE user_id = ?")
            .bind(&transaction.buyer_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO transaction_updates (transaction_id, status, comment, updated_by, created_at)
             VALUES (?, ?, 'escrow released', ?, ?)",
        )
        .bind(id)
        .bind(TransactionStatus::Completed)
        .bind(admin_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(transaction_id = id, admin_id, "escrow released");
        Ok(transaction)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;

    use crate::policy::TransactionStatus;
    use crate::store::{ProductInput, Store, StoreError};

    async fn seeded() -> (Store, crate::store::Product) {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("seller", Some("Seller"), now).await.unwrap();
        store.ensure_profile("buyer", Some("Buyer"), now).await.unwrap();
        let product = store
            .create_product(
                "seller",
                &ProductInput {
                    title: String::from("Mega Hair Liso"),
                    price_cents: 35_000,
                    ..ProductInput::default()
                },
                now,
            )
            .await
            .unwrap();
        (store, product)
    }

    #[tokio::test]
    async fn lifecycle_records_history_and_credits_totals() {
        let (store, product) = seeded().await;
        let now = Utc::now();
        let created = store
            .create_transaction("buyer", &product, Some("pix"), None, now)
            .await
            .unwrap();
        assert_eq!(created.amount_cents, 35_000);
        assert_eq!(created.status, TransactionStatus::Pending);

        use TransactionStatus::*;
        for (from, to, by) in [
            (Pending, Paid, "buyer"),
            (Paid, Shipped, "seller"),
            (Shipped, Delivered, "buyer"),
        ] {
            store
                .set_transaction_status(created.id, from, to, by, None, now)
                .await
                .unwrap();
        }

        let delivered = store.transaction(created.id).await.unwrap().unwrap();
        assert!(delivered.delivery_confirmed_at.is_some());

        let released = store.release_escrow(created.id, "admin", now).await.unwrap();
        assert!(released.escrow_released);
        assert_eq!(released.status, Completed);

        let seller = store.profile("seller").await.unwrap().unwrap();
        let buyer = store.profile("buyer").await.unwrap().unwrap();
        assert_eq!(seller.total_sales, 1);
        assert_eq!(buyer.total_purchases, 1);
        assert_eq!(store.transaction_updates(created.id).await.unwrap().len(), 5);

        let again = store.release_escrow(created.id, "admin", now).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn stale_status_change_conflicts() {
        let (store, product) = seeded().await;
        let now = Utc::now();
        let created = store
            .create_transaction("buyer", &product, None, Some("entregar sexta"), now)
            .await
            .unwrap();

        let result = store
            .set_transaction_status(created.id, TransactionStatus::Paid, TransactionStatus::Shipped, "seller", None, now)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let listed = store.user_transactions("seller").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].buyer_name.as_deref(), Some("Buyer"));
        assert_eq!(listed[0].product_title.as_deref(), Some("Mega Hair Liso"));
    }
}

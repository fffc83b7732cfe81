use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::policy::AdminActionType;

use super::{AdminAction, AdminMessage, AdminMessageView, AdminUser, MarketStats, Store, StoreResult};

/// Platform commission applied to transaction volume, in percent.
const COMMISSION_PERCENT: i64 = 5;

impl Store {
    pub async fn admin_user(&self, user_id: &str) -> StoreResult<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(admin)
    }

    /// Grants (or updates) an admin role for `user_id`.
    pub async fn ensure_admin_user(
        &self,
        user_id: &str,
        role: &str,
        permissions: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<AdminUser> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "INSERT INTO admin_users (user_id, role, permissions, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE
             SET role = excluded.role, permissions = excluded.permissions, updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(user_id)
        .bind(role)
        .bind(permissions)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(admin)
    }

    /// Inserts setup keys that are not known yet. Used keys stay used.
    pub async fn provision_setup_keys(&self, keys: &[String], now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inserted = 0;
        for key in keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
            inserted += sqlx::query(
                "INSERT INTO admin_setup (setup_key, is_used, created_at) VALUES (?, 0, ?)
                 ON CONFLICT (setup_key) DO NOTHING",
            )
            .bind(key)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }
        if inserted > 0 {
            info!(inserted, "admin setup keys provisioned");
        }
        Ok(inserted)
    }

    /// Consumes an unused setup key and makes `user_id` a super admin.
    /// `None` when the key is unknown or already used.
    pub async fn redeem_setup_key(
        &self,
        key: &str,
        user_id: &str,
        permissions: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminUser>> {
        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query(
            "UPDATE admin_setup SET is_used = 1, used_by = ? WHERE setup_key = ? AND is_used = 0",
        )
        .bind(user_id)
        .bind(key)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            return Ok(None);
        }

        let admin = sqlx::query_as::<_, AdminUser>(
            "INSERT INTO admin_users (user_id, role, permissions, created_at, updated_at)
             VALUES (?, 'super_admin', ?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE
             SET role = 'super_admin', permissions = excluded.permissions, updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(user_id)
        .bind(permissions)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(user_id, "admin setup key redeemed");
        Ok(Some(admin))
    }

    /// Records a moderation action. `block` upserts the user's block row and
    /// `unblock` lifts it.
    pub async fn record_admin_action(
        &self,
        admin_id: &str,
        target_user_id: &str,
        action_type: AdminActionType,
        reason: Option<&str>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<AdminAction> {
        let mut tx = self.pool.begin().await?;
        let action = sqlx::query_as::<_, AdminAction>(
            "INSERT INTO admin_actions (admin_id, target_user_id, action_type, reason, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(admin_id)
        .bind(target_user_id)
        .bind(action_type)
        .bind(reason)
        .bind(notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        match action_type {
            AdminActionType::Block => {
                sqlx::query(
                    "INSERT INTO blocked_users (user_id, blocked_by, reason, blocked_at, expires_at)
                     VALUES (?, ?, ?, ?, NULL)
                     ON CONFLICT (user_id) DO UPDATE
                     SET blocked_by = excluded.blocked_by, reason = excluded.reason,
                         blocked_at = excluded.blocked_at, expires_at = NULL",
                )
                .bind(target_user_id)
                .bind(admin_id)
                .bind(reason)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            AdminActionType::Unblock => {
                sqlx::query("DELETE FROM blocked_users WHERE user_id = ?")
                    .bind(target_user_id)
                    .execute(&mut *tx)
                    .await?;
            }
            AdminActionType::Warn | AdminActionType::Review | AdminActionType::Note => {}
        }
        tx.commit().await?;

        info!(admin_id, target_user_id, action = %action_type, "admin action recorded");
        Ok(action)
    }

    pub async fn market_stats(&self) -> StoreResult<MarketStats> {
        let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM user_profiles),
                (SELECT COUNT(*) FROM user_profiles WHERE is_seller = 1),
                (SELECT COUNT(*) FROM user_profiles WHERE is_buyer = 1),
                (SELECT COUNT(*) FROM products WHERE is_available = 1),
                (SELECT COUNT(*) FROM transactions),
                (SELECT COALESCE(SUM(amount_cents), 0) FROM transactions WHERE status != 'cancelled'),
                (SELECT COALESCE(SUM(price_paid_cents), 0) FROM featured_products)",
        )
        .fetch_one(&self.pool)
        .await?;

        let (total_users, total_sellers, total_buyers, total_products, total_transactions, volume, featured) = row;
        Ok(MarketStats {
            total_users,
            total_sellers,
            total_buyers,
            total_products,
            total_transactions,
            total_revenue_cents: volume * COMMISSION_PERCENT / 100,
            featured_revenue_cents: featured,
        })
    }

    /// Sends a direct message to a user and bumps the admin/user thread.
    pub async fn send_admin_message(
        &self,
        admin_id: &str,
        user_id: &str,
        subject: Option<&str>,
        message: &str,
        message_type: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<AdminMessage> {
        let mut tx = self.pool.begin().await?;
        let sent = sqlx::query_as::<_, AdminMessage>(
            "INSERT INTO admin_messages (admin_id, user_id, subject, message, message_type, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)
             RETURNING *",
        )
        .bind(admin_id)
        .bind(user_id)
        .bind(subject)
        .bind(message)
        .bind(message_type)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO admin_conversations (admin_id, user_id, last_message_at, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (admin_id, user_id) DO UPDATE SET last_message_at = excluded.last_message_at",
        )
        .bind(admin_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(admin_id, user_id, message_id = sent.id, "admin message sent");
        Ok(sent)
    }

    /// Messages the admins sent to `user_id`, newest first.
    pub async fn admin_messages_for(&self, user_id: &str) -> StoreResult<Vec<AdminMessageView>> {
        let messages = sqlx::query_as::<_, AdminMessageView>(
            "SELECT am.*, up.name AS user_name
             FROM admin_messages am
             LEFT JOIN user_profiles up ON am.user_id = up.user_id
             WHERE am.user_id = ?
             ORDER BY am.created_at DESC, am.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Returns `false` when the message does not belong to `user_id`.
    pub async fn mark_admin_message_read(&self, id: i64, user_id: &str) -> StoreResult<bool> {
        let updated = sqlx::query("UPDATE admin_messages SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::policy::AdminActionType;
    use crate::store::{ProductInput, Store};

    #[tokio::test]
    async fn setup_keys_are_single_use() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        let keys = vec![String::from("first-key"), String::from("  ")];
        assert_eq!(store.provision_setup_keys(&keys, now).await.unwrap(), 1);
        assert_eq!(store.provision_setup_keys(&keys, now).await.unwrap(), 0);

        let admin = store
            .redeem_setup_key("first-key", "u1", r#"{"all":true}"#, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, "super_admin");
        assert!(store.admin_user("u1").await.unwrap().is_some());

        assert!(store
            .redeem_setup_key("first-key", "u2", "{}", now)
            .await
            .unwrap()
            .is_none());
        assert!(store.redeem_setup_key("nope", "u2", "{}", now).await.unwrap().is_none());
        assert!(store.admin_user("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn block_and_unblock_toggle_status() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("u1", Some("Ana"), now).await.unwrap();

        store
            .record_admin_action("admin", "u1", AdminActionType::Block, Some("spam"), None, now)
            .await
            .unwrap();
        assert!(store.is_blocked("u1", now).await.unwrap());
        assert!(store.list_profiles(now).await.unwrap()[0].is_blocked);

        store
            .record_admin_action("admin", "u1", AdminActionType::Block, Some("again"), None, now)
            .await
            .unwrap();
        store
            .record_admin_action("admin", "u1", AdminActionType::Unblock, None, None, now + Duration::minutes(1))
            .await
            .unwrap();
        assert!(!store.is_blocked("u1", now).await.unwrap());
    }

    #[tokio::test]
    async fn stats_take_commission_on_volume() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("buyer", None, now).await.unwrap();
        store.ensure_profile("seller", None, now).await.unwrap();
        let product = store
            .create_product(
                "seller",
                &ProductInput {
                    title: String::from("Tela"),
                    price_cents: 10_000,
                    ..ProductInput::default()
                },
                now,
            )
            .await
            .unwrap();
        store.create_transaction("buyer", &product, None, None, now).await.unwrap();

        let stats = store.market_stats().await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_products, 1);
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.total_revenue_cents, 500);
    }

    #[tokio::test]
    async fn admin_messages_are_scoped_to_recipient() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        let sent = store
            .send_admin_message("owner_admin", "u1", Some("Aviso"), "Olá", "notification", now)
            .await
            .unwrap();
        store
            .send_admin_message("owner_admin", "u1", None, "De novo", "notification", now + Duration::seconds(1))
            .await
            .unwrap();

        let inbox = store.admin_messages_for("u1").await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].message.message, "De novo");

        assert!(!store.mark_admin_message_read(sent.id, "u2").await.unwrap());
        assert!(store.mark_admin_message_read(sent.id, "u1").await.unwrap());
    }
}

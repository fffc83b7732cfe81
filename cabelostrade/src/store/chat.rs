use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    ChatMessage, ChatMessageView, Conversation, ConversationOverview, ConversationSummary, Store,
    StoreResult,
};

impl Store {
    /// Conversation `id` if `user_id` is its buyer or seller.
    pub async fn conversation_for(&self, id: i64, user_id: &str) -> StoreResult<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM chat_conversations WHERE id = ?1 AND (buyer_id = ?2 OR seller_id = ?2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(conversation)
    }

    /// Returns the buyer/seller/product conversation, creating it (and its
    /// opening message) when it does not exist. The flag is `true` on creation.
    pub async fn open_conversation(
        &self,
        buyer_id: &str,
        seller_id: &str,
        product_id: i64,
        initial_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query_as::<_, Conversation>(
            "INSERT INTO chat_conversations (buyer_id, seller_id, product_id, last_message_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (buyer_id, seller_id, product_id) DO NOTHING
             RETURNING *",
        )
        .bind(buyer_id)
        .bind(seller_id)
        .bind(product_id)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(conversation) = inserted else {
            let existing = sqlx::query_as::<_, Conversation>(
                "SELECT * FROM chat_conversations WHERE buyer_id = ? AND seller_id = ? AND product_id = ?",
            )
            .bind(buyer_id)
            .bind(seller_id)
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok((existing, false));
        };

        if let Some(message) = initial_message.map(str::trim).filter(|m| !m.is_empty()) {
            sqlx::query(
                "INSERT INTO chat_messages (conversation_id, sender_id, message, message_type, created_at, updated_at)
                 VALUES (?, ?, ?, 'text', ?, ?)",
            )
            .bind(conversation.id)
            .bind(buyer_id)
            .bind(message)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(conversation_id = conversation.id, product_id, "conversation opened");
        Ok((conversation, true))
    }

    /// The user's conversations with the latest message and their unread count.
    pub async fn user_conversations(&self, user_id: &str) -> StoreResult<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            "SELECT cc.*, p.title AS product_title, p.main_image_url AS product_image_url,
                    CASE WHEN cc.buyer_id = ?1 THEN seller_up.name ELSE buyer_up.name END AS other_user_name,
                    (SELECT message FROM chat_messages
                     WHERE conversation_id = cc.id ORDER BY created_at DESC, id DESC LIMIT 1) AS last_message,
                    (SELECT COUNT(*) FROM chat_messages
                     WHERE conversation_id = cc.id AND sender_id != ?1 AND is_read = 0) AS unread_count
             FROM chat_conversations cc
             LEFT JOIN products p ON cc.product_id = p.id
             LEFT JOIN user_profiles seller_up ON cc.seller_id = seller_up.user_id
             LEFT JOIN user_profiles buyer_up ON cc.buyer_id = buyer_up.user_id
             WHERE cc.buyer_id = ?1 OR cc.seller_id = ?1
             ORDER BY cc.last_message_at DESC, cc.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversations)
    }

    /// Every conversation on the platform, for moderation.
    pub async fn all_conversations(&self) -> StoreResult<Vec<ConversationOverview>> {
        let conversations = sqlx::query_as::<_, ConversationOverview>(
            "SELECT cc.*, p.title AS product_title,
                    buyer_up.name AS buyer_name, seller_up.name AS seller_name,
                    (SELECT COUNT(*) FROM chat_messages WHERE conversation_id = cc.id) AS message_count,
                    (SELECT message FROM chat_messages
                     WHERE conversation_id = cc.id ORDER BY created_at DESC, id DESC LIMIT 1) AS last_message
             FROM chat_conversations cc
             LEFT JOIN products p ON cc.product_id = p.id
             LEFT JOIN user_profiles buyer_up ON cc.buyer_id = buyer_up.user_id
             LEFT JOIN user_profiles seller_up ON cc.seller_id = seller_up.user_id
             ORDER BY cc.last_message_at DESC, cc.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(conversations)
    }

    pub async fn conversation_messages(&self, conversation_id: i64) -> StoreResult<Vec<ChatMessageView>> {
        let messages = sqlx::query_as::<_, ChatMessageView>(
            "SELECT cm.*, up.name AS sender_name
             FROM chat_messages cm
             LEFT JOIN user_profiles up ON cm.sender_id = up.user_id
             WHERE cm.conversation_id = ?
             ORDER BY cm.created_at ASC, cm.id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Marks messages the other participant sent as read by `reader_id`.
    pub async fn mark_conversation_read(&self, conversation_id: i64, reader_id: &str) -> StoreResult<u64> {
        let updated = sqlx::query(
            "UPDATE chat_messages SET is_read = 1
             WHERE conversation_id = ? AND sender_id != ? AND is_read = 0",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated)
    }

    pub async fn send_chat_message(
        &self,
        conversation_id: i64,
        sender_id: &str,
        message: &str,
        message_type: &str,
        image_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<ChatMessage> {
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages (conversation_id, sender_id, message, message_type, image_url, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(message)
        .bind(message_type)
        .bind(image_url)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE chat_conversations SET last_message_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::store::Store;

    #[tokio::test]
    async fn unread_counts_are_per_reader() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.ensure_profile("buyer", Some("Buyer"), now).await.unwrap();
        store.ensure_profile("seller", Some("Seller"), now).await.unwrap();

        let (conversation, created) = store
            .open_conversation("buyer", "seller", 7, Some("Ainda disponível?"), now)
            .await
            .unwrap();
        assert!(created);
        let (again, created) = store
            .open_conversation("buyer", "seller", 7, Some("ignored"), now)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, conversation.id);

        store
            .send_chat_message(conversation.id, "buyer", "Olá?", "text", None, now + Duration::seconds(1))
            .await
            .unwrap();

        let seller_view = store.user_conversations("seller").await.unwrap();
        assert_eq!(seller_view.len(), 1);
        assert_eq!(seller_view[0].unread_count, 2);
        assert_eq!(seller_view[0].other_user_name.as_deref(), Some("Buyer"));
        assert_eq!(seller_view[0].last_message.as_deref(), Some("Olá?"));

        let buyer_view = store.user_conversations("buyer").await.unwrap();
        assert_eq!(buyer_view[0].unread_count, 0);
        assert_eq!(buyer_view[0].other_user_name.as_deref(), Some("Seller"));

        assert_eq!(store.mark_conversation_read(conversation.id, "seller").await.unwrap(), 2);
        let seller_view = store.user_conversations("seller").await.unwrap();
        assert_eq!(seller_view[0].unread_count, 0);

        assert!(store.conversation_for(conversation.id, "stranger").await.unwrap().is_none());
        let overview = store.all_conversations().await.unwrap();
        assert_eq!(overview[0].message_count, 2);
    }

    #[tokio::test]
    async fn simultaneous_first_contacts_share_one_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("chat.db").display());
        let store = Store::connect(&url, 4).await.unwrap();
        store.migrate().await.unwrap();
        let now = Utc::now();

        let (first, second) = tokio::join!(
            store.open_conversation("buyer", "seller", 9, Some("Oi"), now),
            store.open_conversation("buyer", "seller", 9, Some("Oi"), now),
        );
        let (first, first_created) = first.unwrap();
        let (second, second_created) = second.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first_created ^ second_created);
        assert_eq!(store.all_conversations().await.unwrap().len(), 1);
    }
}

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::policy::{ticket_queue_order, TicketCategory, TicketPriority, TicketStatus};

use super::{Store, StoreError, StoreResult, SupportResponse, SupportStaff, SupportTicket};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$")
        .unwrap_or_else(|e| panic!("email regex must be valid: {e}"))
});

/// A ticket as submitted through the public contact form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub user_name: String,
    pub user_email: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub category: TicketCategory,
    #[serde(default)]
    pub priority: TicketPriority,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), String> {
        if [&self.user_name, &self.user_email, &self.subject, &self.message]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(String::from("name, email, subject and message are required"));
        }
        if !EMAIL_RE.is_match(self.user_email.trim()) {
            return Err(String::from("invalid email address"));
        }
        Ok(())
    }
}

impl Store {
    /// Creates or refreshes a staff account from the credentials file.
    pub async fn upsert_support_staff(
        &self,
        username: &str,
        password_hash: &str,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<SupportStaff> {
        let staff = sqlx::query_as::<_, SupportStaff>(
            "INSERT INTO support_staff (username, password_hash, name, email, role, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'support', 1, ?, ?)
             ON CONFLICT (username) DO UPDATE
             SET password_hash = excluded.password_hash, name = excluded.name,
                 email = excluded.email, updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(username)
        .bind(password_hash)
        .bind(name)
        .bind(email)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        info!(username, "support staff provisioned");
        Ok(staff)
    }

    pub async fn support_staff_by_username(&self, username: &str) -> StoreResult<Option<SupportStaff>> {
        let staff = sqlx::query_as::<_, SupportStaff>(
            "SELECT * FROM support_staff WHERE username = ? AND is_active = 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(staff)
    }

    pub async fn support_staff(&self, id: i64) -> StoreResult<Option<SupportStaff>> {
        let staff = sqlx::query_as::<_, SupportStaff>(
            "SELECT * FROM support_staff WHERE id = ? AND is_active = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(staff)
    }

    /// The support queue: open work first, then by urgency, newest first.
    pub async fn support_tickets(&self) -> StoreResult<Vec<SupportTicket>> {
        let sql = format!("SELECT * FROM support_tickets ORDER BY {}", ticket_queue_order());
        let tickets = sqlx::query_as::<_, SupportTicket>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    pub async fn support_ticket(&self, id: i64) -> StoreResult<Option<SupportTicket>> {
        let ticket = sqlx::query_as::<_, SupportTicket>("SELECT * FROM support_tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    pub async fn create_support_ticket(
        &self,
        user_id: Option<&str>,
        ticket: &NewTicket,
        now: DateTime<Utc>,
    ) -> StoreResult<SupportTicket> {
        let created = sqlx::query_as::<_, SupportTicket>(
            "INSERT INTO support_tickets (user_id, user_name, user_email, subject, message,
                                          status, priority, category, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(user_id)
        .bind(ticket.user_name.trim())
        .bind(ticket.user_email.trim())
        .bind(ticket.subject.trim())
        .bind(ticket.message.trim())
        .bind(TicketStatus::Open)
        .bind(ticket.priority)
        .bind(ticket.category)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(ticket_id = created.id, category = %created.category, "support ticket opened");
        Ok(created)
    }

    pub async fn ticket_responses(&self, ticket_id: i64) -> StoreResult<Vec<SupportResponse>> {
        let responses = sqlx::query_as::<_, SupportResponse>(
            "SELECT * FROM support_responses WHERE ticket_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(responses)
    }

    /// Appends a staff response and touches the ticket.
    pub async fn add_ticket_response(
        &self,
        ticket_id: i64,
        staff: &SupportStaff,
        message: &str,
        is_internal: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<SupportResponse> {
        let mut tx = self.pool.begin().await?;
        let touched = sqlx::query("UPDATE support_tickets SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Err(StoreError::NotFound("ticket"));
        }

        let response = sqlx::query_as::<_, SupportResponse>(
            "INSERT INTO support_responses (ticket_id, responder_id, responder_name, message, is_internal,
                                            created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(ticket_id)
        .bind(staff.id.to_string())
        .bind(&staff.name)
        .bind(message)
        .bind(is_internal)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(response)
    }

    pub async fn set_ticket_status(
        &self,
        ticket_id: i64,
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<SupportTicket> {
        let ticket = sqlx::query_as::<_, SupportTicket>(
            "UPDATE support_tickets SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(status)
        .bind(now)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("ticket"))?;
        debug!(ticket_id, status = %status, "ticket status changed");
        Ok(ticket)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, Utc};

    use super::NewTicket;
    use crate::policy::{TicketCategory, TicketPriority, TicketStatus};
    use crate::store::{Store, StoreError};

    fn ticket(subject: &str, priority: TicketPriority) -> NewTicket {
        NewTicket {
            user_name: String::from("Ana"),
            user_email: String::from("ana@example.com"),
            subject: subject.to_string(),
            message: String::from("Preciso de ajuda"),
            category: TicketCategory::General,
            priority,
        }
    }

    #[test]
    fn new_ticket_requires_fields_and_email() {
        assert!(ticket("Pedido", TicketPriority::Low).validate().is_ok());

        let mut missing = ticket("   ", TicketPriority::Low);
        assert!(missing.validate().is_err());
        missing.subject = String::from("ok");
        missing.user_email = String::from("ana@localhost");
        assert!(missing.validate().is_err());
        missing.user_email = String::from("@example.com");
        assert!(missing.validate().is_err());
    }

    #[tokio::test]
    async fn queue_puts_open_urgent_work_first() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();

        let low = store
            .create_support_ticket(None, &ticket("low", TicketPriority::Low), now)
            .await
            .unwrap();
        let urgent = store
            .create_support_ticket(Some("u1"), &ticket("urgent", TicketPriority::Urgent), now + Duration::seconds(1))
            .await
            .unwrap();
        let closed = store
            .create_support_ticket(None, &ticket("closed", TicketPriority::Urgent), now + Duration::seconds(2))
            .await
            .unwrap();
        store
            .set_ticket_status(closed.id, TicketStatus::Closed, now)
            .await
            .unwrap();

        let queue: Vec<i64> = store.support_tickets().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(queue, vec![urgent.id, low.id, closed.id]);

        let missing = store.set_ticket_status(999, TicketStatus::Resolved, now).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn responses_attach_staff_name() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        let staff = store
            .upsert_support_staff("suporte", "hash", "Equipe Suporte", "suporte@example.com", now)
            .await
            .unwrap();
        assert!(store.support_staff_by_username("suporte").await.unwrap().is_some());

        let opened = store
            .create_support_ticket(None, &ticket("help", TicketPriority::Medium), now)
            .await
            .unwrap();
        store
            .add_ticket_response(opened.id, &staff, "Estamos verificando", false, now)
            .await
            .unwrap();

        let responses = store.ticket_responses(opened.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].responder_name, "Equipe Suporte");

        let missing = store.add_ticket_response(404, &staff, "x", false, now).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }
}

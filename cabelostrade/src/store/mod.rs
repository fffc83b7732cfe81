//! SQLite persistence for the marketplace.
//!
//! Every operation is a short parameterised statement (or a handful inside one
//! transaction) against a [`sqlx::SqlitePool`]. Timestamps are always bound
//! from Rust so edit-window and expiry comparisons share a single clock.

mod admin;
mod chat;
mod images;
mod models;
mod products;
mod profiles;
mod reviews;
mod schema;
mod support;
mod transactions;

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

pub use models::*;
pub use products::{ProductFilter, ProductInput};
pub use profiles::ProfileUpdate;
pub use support::NewTicket;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(url, max_connections, "database connected");
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; the connection is never recycled
    /// so the schema survives for the lifetime of the pool.
    #[cfg(test)]
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(statements = schema::STATEMENTS.len(), "schema ensured");
        Ok(())
    }

    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Inserts the demo sellers and listings unless they already exist.
    pub async fn seed_demo(&self) -> StoreResult<()> {
        let now = Utc::now();
        let sellers = [
            ("demo_seller_1", "Salão Beauty Pro", "Beauty Pro Studio"),
            ("demo_seller_2", "Mega Hair Premium", "Premium Hair Solutions"),
        ];
        let products = [
            (
                "demo_seller_1",
                "Mega Hair Liso Premium 60cm",
                "Mega hair 100% natural, liso sedoso, 60cm de comprimento",
                "liso",
                "castanho",
                35_000_i64,
                "https://images.unsplash.com/photo-1562322140-8baeececf3df?w=400&h=400&fit=crop",
            ),
            (
                "demo_seller_2",
                "Mega Hair Cacheado Natural 50cm",
                "Cabelo cacheado natural, textura 3B, perfeito para volume",
                "cacheado",
                "preto",
                42_000_i64,
                "https://images.unsplash.com/photo-1594736797933-d0280ba600ba?w=400&h=400&fit=crop",
            ),
        ];

        let mut tx = self.pool.begin().await?;
        for (user_id, name, business_name) in sellers {
            sqlx::query(
                "INSERT INTO user_profiles (user_id, name, is_seller, is_buyer, business_name, created_at, updated_at)
                 SELECT ?, ?, 1, 1, ?, ?, ?
                 WHERE NOT EXISTS (SELECT 1 FROM user_profiles WHERE user_id = ?)",
            )
            .bind(user_id)
            .bind(name)
            .bind(business_name)
            .bind(now)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        for (seller_id, title, description, hair_type, hair_color, price_cents, image) in products {
            sqlx::query(
                "INSERT INTO products (seller_id, title, description, hair_type, hair_color, price_cents, main_image_url, created_at, updated_at)
                 SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
                 WHERE NOT EXISTS (SELECT 1 FROM products WHERE seller_id = ? AND title = ?)",
            )
            .bind(seller_id)
            .bind(title)
            .bind(description)
            .bind(hair_type)
            .bind(hair_color)
            .bind(price_cents)
            .bind(image)
            .bind(now)
            .bind(now)
            .bind(seller_id)
            .bind(title)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(sellers = sellers.len(), products = products.len(), "demo data ensured");
        Ok(())
    }
}

/// Escapes `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{like_pattern, Store};

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("liso"), "%liso%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn migrate_is_idempotent_and_seed_runs_once() {
        let store = Store::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store.seed_demo().await.unwrap();
        store.seed_demo().await.unwrap();

        let filter = super::ProductFilter::default();
        let listings = store
            .list_products(&filter, 50, 0, chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(listings.len(), 2);
        assert!(store.ping().await.is_ok());
    }
}

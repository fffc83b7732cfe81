//! # cabelostrade
//!
//! REST backend for a marketplace of human hair for extensions.
//!
//! Sellers list hair, buyers purchase through a tracked lifecycle, both sides
//! chat and review each other, and staff moderate through admin and support
//! panels.
//!
//! ## Architecture
//!
//! - **Store**: SQLite through `sqlx`, one module per marketplace area
//! - **Policy**: pure rules (edit window, featured ranking, lifecycle, limits)
//! - **Identity**: external OAuth session service behind a trait
//! - **HTTP**: Axum router with rate limiting, request IDs, CORS, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod http;
mod identity;
mod policy;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::serve;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::{hash_password, load_credentials};
use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState, ServerSettings, SessionStore};
use crate::identity::HttpIdentityProvider;
use crate::store::Store;

/// How often expired admin and support sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    let credentials =
        load_credentials(config.auth_file.as_deref()).context("failed to load credentials file")?;
    info!(
        bind = %config.bind,
        database = %config.database_url,
        admin_console = credentials.admin_login_enabled(),
        admin_count = credentials.admin_count(),
        auth_file = ?config.auth_file.as_ref().map(|path| path.display().to_string()),
        edit_window_minutes = config.edit_window.num_minutes(),
        secure_cookies = config.secure_cookies,
        "configuration loaded"
    );

    let store = Store::connect(&config.database_url, config.database_max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    store.migrate().await.context("failed to apply schema")?;

    let now = Utc::now();
    for account in credentials.support_accounts() {
        store
            .upsert_support_staff(
                &account.username,
                &hash_password(&account.password),
                &account.name,
                &account.email,
                now,
            )
            .await
            .with_context(|| format!("failed to provision support account {}", account.username))?;
    }
    store
        .provision_setup_keys(&config.setup_keys, now)
        .await
        .context("failed to provision admin setup keys")?;
    if config.seed_demo {
        store.seed_demo().await.context("failed to seed demo data")?;
    }

    let identity =
        HttpIdentityProvider::new(&config.identity).context("failed to build identity client")?;
    if !identity.is_configured() {
        warn!("identity service is not configured; user sign-in will fail");
    }

    let admin_sessions = SessionStore::new(config.admin_session_ttl);
    let support_sessions = SessionStore::new(config.support_session_ttl);
    spawn_session_sweeper(admin_sessions.clone(), support_sessions.clone());

    let state = AppState {
        store,
        identity: Arc::new(identity),
        credentials: Arc::new(credentials),
        admin_sessions,
        support_sessions,
        settings: Arc::new(ServerSettings {
            secure_cookies: config.secure_cookies,
            edit_window: config.edit_window,
            max_upload_bytes: config.max_upload_bytes,
        }),
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    if !config.secure_cookies {
        warn!("secure cookies disabled; session cookies use SameSite=Lax over plain HTTP");
    }

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "cabelostrade listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

/// Periodically drops expired console and support sessions.
fn spawn_session_sweeper(admin: SessionStore<String>, support: SessionStore<i64>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let admin_purged = admin.purge_expired();
            let support_purged = support.purge_expired();
            if admin_purged + support_purged > 0 {
                debug!(admin_purged, support_purged, "expired sessions swept");
            }
        }
    });
}

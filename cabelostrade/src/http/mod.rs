//! HTTP layer: Axum router, session gating, and the marketplace handlers.
//!
//! Users authenticate through the identity service (`session_token` cookie);
//! admin console and support staff sessions live in process.

mod admin;
mod auth;
mod chat;
mod error;
mod handlers;
mod products;
mod profiles;
mod responses;
mod reviews;
mod state;
mod support;
mod transactions;
mod uploads;


pub use handlers::router;
pub use state::{AppState, ServerSettings, SessionStore};

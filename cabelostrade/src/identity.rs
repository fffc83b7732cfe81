//! Hosted identity service: Google OAuth redirect, code exchange and session
//! lookup. User sessions live in the identity service; this process only
//! carries the opaque session token in a cookie.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::IdentityConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub google_user_data: GoogleUserData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleUserData {
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity service answered {0}")]
    Status(StatusCode),
    #[error("identity service is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// OAuth redirect URL for `provider` (e.g. `google`).
    async fn redirect_url(&self, provider: &str) -> Result<String, IdentityError>;

    /// Trades an OAuth callback code for a session token.
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError>;

    /// The user behind `token`, or `None` when it is unknown or expired.
    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError>;

    async fn delete_session(&self, token: &str) -> Result<(), IdentityError>;
}

/// [`IdentityProvider`] backed by the hosted users service REST API.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    base_url: Option<String>,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RedirectUrlResponse {
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_token: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        let base_url = config
            .api_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, IdentityError> {
        let base_url = self.base_url.as_deref().ok_or(IdentityError::NotConfigured)?;
        let mut request = self.client.request(method, format!("{base_url}{path}"));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        Ok(request)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn redirect_url(&self, provider: &str) -> Result<String, IdentityError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/oauth/{provider}/redirect_url"))?
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdentityError::Status(response.status()));
        }
        let body: RedirectUrlResponse = response.json().await?;
        Ok(body.redirect_url)
    }

    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let response = self
            .request(reqwest::Method::POST, "/sessions")?
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdentityError::Status(response.status()));
        }
        let body: SessionResponse = response.json().await?;
        Ok(body.session_token)
    }

    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let response = self
            .request(reqwest::Method::GET, "/users/me")?
            .bearer_auth(token)
            .send()
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("identity session rejected");
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(IdentityError::Status(status)),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<(), IdentityError> {
        let response = self
            .request(reqwest::Method::DELETE, "/sessions")?
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(IdentityError::Status(response.status()));
        }
        Ok(())
    }
}

/// In-memory provider: codes map to tokens, tokens map to users.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StaticIdentity {
    codes: dashmap::DashMap<String, String>,
    sessions: dashmap::DashMap<String, IdentityUser>,
}

#[cfg(test)]
impl StaticIdentity {
    /// Registers `user` behind session `token`, exchangeable from `code`.
    pub fn with_user(self, code: &str, token: &str, user_id: &str, name: &str) -> Self {
        self.codes.insert(code.to_string(), token.to_string());
        self.sessions.insert(
            token.to_string(),
            IdentityUser {
                id: user_id.to_string(),
                email: format!("{user_id}@example.com"),
                google_user_data: GoogleUserData {
                    name: Some(name.to_string()),
                    picture: None,
                },
            },
        );
        self
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn redirect_url(&self, provider: &str) -> Result<String, IdentityError> {
        Ok(format!("https://identity.test/oauth/{provider}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        self.codes
            .get(code)
            .map(|token| token.clone())
            .ok_or(IdentityError::Status(StatusCode::BAD_REQUEST))
    }

    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        Ok(self.sessions.get(token).map(|user| user.clone()))
    }

    async fn delete_session(&self, token: &str) -> Result<(), IdentityError> {
        self.sessions.remove(token);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{HttpIdentityProvider, IdentityError, IdentityProvider, IdentityUser};
    use crate::config::IdentityConfig;

    #[tokio::test]
    async fn unconfigured_provider_fails_closed() {
        let provider = HttpIdentityProvider::new(&IdentityConfig::default()).unwrap();
        assert!(!provider.is_configured());
        let result = provider.current_user("token").await;
        assert!(matches!(result, Err(IdentityError::NotConfigured)));
    }

    #[test]
    fn user_payload_tolerates_missing_google_data() {
        let user: IdentityUser =
            serde_json::from_str(r#"{"id":"u1","email":"a@example.com"}"#).unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.google_user_data.name.is_none());
    }
}

//! Identity resolution against the external identity store.
//!
//! Security boundaries:
//! - Bearer tokens are exchanged remotely and never logged.
//! - Unreliable mobile clients get a bounded retry; reliable clients fail fast.

use crate::continuity::{ClientClass, CredentialSource};
use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::RwLock, time::sleep};
use uuid::Uuid;

const UNSTABLE_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(300);
const CLIENT_CLASS_HEADER: &str = "x-client-class";

/// User identity owned by the external store; read-only here.
#[derive(Clone, Debug, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Capability interface over the identity store, so the pipelines can be
/// exercised with deterministic stand-ins.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Production client talking to the identity store over HTTP.
#[derive(Debug)]
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        let url = format!("{}/v1/identity/resolve", self.base_url);
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<Identity>()
                .await
                .map_err(|err| IdentityError::Unavailable(err.to_string())),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(IdentityError::Unauthenticated)
            }
            status => Err(IdentityError::Unavailable(format!(
                "identity store returned {status}"
            ))),
        }
    }
}

/// Classify the requesting client from the hint header or the user agent.
#[must_use]
pub fn detect_client_class(headers: &HeaderMap) -> ClientClass {
    if let Some(hint) = headers
        .get(CLIENT_CLASS_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        return ClientClass::parse(hint);
    }

    let unstable_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|agent| {
            // Webview/background-stack signatures known to drop auth sessions.
            Regex::new(r"(?i)(android.*\bwv\b|okhttp|dalvik)")
                .is_ok_and(|regex| regex.is_match(agent))
        });
    if unstable_agent {
        ClientClass::UnstableMobile
    } else {
        ClientClass::Reliable
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer credential in `headers` to an identity.
///
/// Unstable mobile clients retry the exchange up to two more times with a
/// fixed delay; all other failures surface immediately. Per contract every
/// exhausted attempt sequence is reported as `Unauthenticated`.
///
/// # Errors
/// Returns `IdentityError::Unauthenticated` when no token is supplied or all
/// attempts fail.
pub async fn verify(
    headers: &HeaderMap,
    client: &dyn IdentityClient,
) -> Result<Identity, IdentityError> {
    let token = extract_bearer_token(headers).ok_or(IdentityError::Unauthenticated)?;
    let client_class = detect_client_class(headers);

    let retries = if client_class.is_unstable() {
        UNSTABLE_RETRIES
    } else {
        0
    };

    let mut attempt = 0;
    loop {
        match client.resolve(&token).await {
            Ok(identity) => return Ok(identity),
            Err(_) if attempt < retries => {
                attempt += 1;
                sleep(RETRY_DELAY).await;
            }
            Err(_) => return Err(IdentityError::Unauthenticated),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Holder of the process's own long-lived credential toward the identity
/// store. The continuity watchdog drives refresh and restore; the seed is
/// the credential material persisted at launch.
pub struct CredentialKeeper {
    http: reqwest::Client,
    base_url: String,
    current: RwLock<SecretString>,
    seed: SecretString,
}

impl CredentialKeeper {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, credential: SecretString) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            current: RwLock::new(credential.clone()),
            seed: credential,
        })
    }

    async fn current_token(&self) -> String {
        self.current.read().await.expose_secret().to_string()
    }
}

#[async_trait]
impl CredentialSource for CredentialKeeper {
    async fn refresh(&self) -> anyhow::Result<()> {
        let url = format!("{}/v1/identity/refresh", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(self.current_token().await)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("credential refresh returned {}", response.status());
        }
        let refreshed: RefreshResponse = response.json().await?;
        *self.current.write().await = SecretString::from(refreshed.token);
        Ok(())
    }

    async fn restore_persisted(&self) -> anyhow::Result<()> {
        // Fall back to the credential material persisted at launch, then
        // prove it still backs a live session.
        *self.current.write().await = self.seed.clone();
        if self.session_alive().await? {
            Ok(())
        } else {
            anyhow::bail!("persisted credential no longer backs a live session")
        }
    }

    async fn session_alive(&self) -> anyhow::Result<bool> {
        let url = format!("{}/v1/identity/session", self.base_url);
        let response = self
            .http
            .get(url)
            .bearer_auth(self.current_token().await)
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Ok(false),
            status => anyhow::bail!("session probe returned {status}"),
        }
    }
}

//! Short-lived validation tokens minted on successful admin checks.
//!
//! The token is an opaque base64url-encoded JSON document carrying the user
//! id, issue time, and a random nonce. Callers reuse it for roughly five
//! minutes; no expiry is enforced server-side. `age_seconds` exists so a
//! consumer can apply its own freshness policy.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reuse window consumers are expected to honor.
pub const TOKEN_REUSE_WINDOW_SECONDS: i64 = 5 * 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationToken {
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub nonce: String,
}

impl ValidationToken {
    /// Mint a fresh token for a confirmed admin.
    ///
    /// # Errors
    /// Returns an error if the nonce cannot be generated or encoded.
    pub fn mint(user_id: Uuid) -> Result<String> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate token nonce")?;
        let token = Self {
            user_id,
            issued_at: Utc::now(),
            nonce: Base64UrlUnpadded::encode_string(&bytes),
        };
        let json = serde_json::to_vec(&token).context("failed to serialize validation token")?;
        Ok(Base64UrlUnpadded::encode_string(&json))
    }

    /// Decode an opaque token back into its claims.
    ///
    /// # Errors
    /// Returns an error if the input is not a token minted by `mint`.
    pub fn decode(encoded: &str) -> Result<Self> {
        let json = Base64UrlUnpadded::decode_vec(encoded.trim())
            .map_err(|_| anyhow::anyhow!("invalid validation token encoding"))?;
        serde_json::from_slice(&json).context("invalid validation token payload")
    }

    /// Seconds elapsed since the token was issued.
    #[must_use]
    pub fn age_seconds(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.issued_at)
            .num_seconds()
    }
}

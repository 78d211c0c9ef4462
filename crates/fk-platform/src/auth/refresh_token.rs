//! Refresh Token Entity
//!
//! Long-lived tokens exchanged for new access tokens. Only the SHA-256
//! hash is stored; the raw token is returned to the client exactly once.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, Duration};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

/// Default refresh token expiry: 30 days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    #[serde(rename = "_id")]
    pub id: String,

    /// SHA-256 hash of the raw token (unique)
    pub token_hash: String,

    /// Owning user
    pub user_id: String,

    /// Whether this token has been revoked (rotation or logout)
    #[serde(default)]
    pub revoked: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Create from a pre-hashed token. Use `generate_token_pair` to mint
    /// the raw token and entity together.
    pub fn new(token_hash: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            token_hash: token_hash.into(),
            user_id: user_id.into(),
            revoked: false,
            created_at: now,
            expires_at: now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        }
    }

    /// Create with custom expiry duration
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expires_at = self.created_at + expiry;
        self
    }

    /// Check if the token is valid (not expired and not revoked)
    pub fn is_valid(&self) -> bool {
        !self.revoked && Utc::now() < self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn revoke(&mut self) {
        self.revoked = true;
    }

    /// Generate a cryptographically random token string
    pub fn generate_raw_token() -> String {
        use rand::Rng;
        use base64::Engine;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Hash a raw token for storage
    pub fn hash_token(raw_token: &str) -> String {
        use sha2::{Sha256, Digest};
        use base64::Engine;

        let mut hasher = Sha256::new();
        hasher.update(raw_token.as_bytes());
        let hash = hasher.finalize();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
    }

    /// Generate a token pair (raw token for client, entity for storage)
    pub fn generate_token_pair(user_id: impl Into<String>) -> (String, Self) {
        let raw_token = Self::generate_raw_token();
        let token_hash = Self::hash_token(&raw_token);
        let entity = Self::new(token_hash, user_id);
        (raw_token, entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token() {
        let (raw, token) = RefreshToken::generate_token_pair("user-123");

        assert!(!raw.is_empty());
        assert_eq!(token.user_id, "user-123");
        assert!(!token.revoked);
        assert!(token.is_valid());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_hashing() {
        let raw = RefreshToken::generate_raw_token();
        let hash1 = RefreshToken::hash_token(&raw);
        let hash2 = RefreshToken::hash_token(&raw);

        // Same input produces same hash
        assert_eq!(hash1, hash2);

        // Different input produces different hash
        let raw2 = RefreshToken::generate_raw_token();
        let hash3 = RefreshToken::hash_token(&raw2);
        assert_ne!(hash1, hash3);

        // Raw token never equals its stored form
        assert_ne!(raw, hash1);
    }

    #[test]
    fn test_revoke_token() {
        let (_, mut token) = RefreshToken::generate_token_pair("user-123");
        assert!(token.is_valid());

        token.revoke();
        assert!(!token.is_valid());
        assert!(token.revoked);
    }

    #[test]
    fn test_expired_token_invalid() {
        let (_, token) = RefreshToken::generate_token_pair("user-123");
        let token = token.with_expiry(Duration::seconds(-1));

        assert!(token.is_expired());
        assert!(!token.is_valid());
    }
}

//! Refresh Token Repository

use mongodb::{Collection, Database, bson::doc};
use crate::auth::refresh_token::RefreshToken;
use crate::shared::error::Result;

pub struct RefreshTokenRepository {
    collection: Collection<RefreshToken>,
}

impl RefreshTokenRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("refresh_tokens"),
        }
    }

    pub async fn insert(&self, token: &RefreshToken) -> Result<()> {
        self.collection.insert_one(token).await?;
        Ok(())
    }

    /// Look up a token by hash, returning it only if usable.
    /// Expiry is checked in code so clock handling stays in one place.
    pub async fn find_valid_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let token = self
            .collection
            .find_one(doc! { "tokenHash": token_hash, "revoked": false })
            .await?;
        Ok(token.filter(|t| t.is_valid()))
    }

    pub async fn revoke_by_hash(&self, token_hash: &str) -> Result<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "tokenHash": token_hash },
                doc! { "$set": { "revoked": true } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "userId": user_id, "revoked": false },
                doc! { "$set": { "revoked": true } },
            )
            .await?;
        Ok(result.modified_count)
    }
}

//! User Repository

use mongodb::{Collection, Database, bson::doc};
use futures::TryStreamExt;
use crate::user::entity::User;
use crate::shared::error::Result;
use crate::storage::is_duplicate_key_error;

pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        self.collection.insert_one(user).await?;
        Ok(())
    }

    /// Insert unless a user with the same email exists.
    pub async fn insert_if_absent(&self, user: &User) -> Result<bool> {
        match self.collection.insert_one(user).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { "email": email.to_lowercase() })
            .await?)
    }

    pub async fn find_all(&self) -> Result<Vec<User>> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find_by_institution(&self, institution_id: &str) -> Result<Vec<User>> {
        let cursor = self
            .collection
            .find(doc! { "institutionId": institution_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn count_by_group(&self, group_id: &str) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "groupId": group_id })
            .await?)
    }

    pub async fn update(&self, user: &User) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &user.id }, user)
            .await?;
        Ok(())
    }

    /// Stamp a successful login on the account.
    pub async fn record_login(&self, id: &str) -> Result<()> {
        let now = mongodb::bson::DateTime::now();
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "lastLoginAt": now, "updatedAt": now } },
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    /// Detach every member of an institution. Used when the tenant is
    /// deleted; accounts survive without membership.
    pub async fn detach_all_from_institution(&self, institution_id: &str) -> Result<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "institutionId": institution_id },
                doc! { "$unset": { "institutionId": "" } },
            )
            .await?;
        Ok(result.modified_count)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    pub async fn count_by_institution(&self, institution_id: &str) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "institutionId": institution_id })
            .await?)
    }
}

//! User Group Repository

use mongodb::{Collection, Database, bson::doc};
use futures::TryStreamExt;
use crate::user_group::entity::UserGroup;
use crate::shared::error::Result;
use crate::storage::is_duplicate_key_error;

pub struct UserGroupRepository {
    collection: Collection<UserGroup>,
}

impl UserGroupRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("user_groups"),
        }
    }

    pub async fn insert(&self, group: &UserGroup) -> Result<()> {
        self.collection.insert_one(group).await?;
        Ok(())
    }

    /// Insert unless a group with the same name exists.
    ///
    /// Returns true if inserted, false if the unique name index reported a
    /// duplicate. Safe to race: the index, not a prior read, decides.
    pub async fn insert_if_absent(&self, group: &UserGroup) -> Result<bool> {
        match self.collection.insert_one(group).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserGroup>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<UserGroup>> {
        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    /// Find the group holding the system-wide administrative scope.
    pub async fn find_system_wide(&self) -> Result<Option<UserGroup>> {
        Ok(self
            .collection
            .find_one(doc! { "scope": "SYSTEM_WIDE" })
            .await?)
    }

    pub async fn find_all(&self) -> Result<Vec<UserGroup>> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let count = self.collection.count_documents(doc! { "_id": id }).await?;
        Ok(count > 0)
    }

    pub async fn update(&self, group: &UserGroup) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &group.id }, group)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}

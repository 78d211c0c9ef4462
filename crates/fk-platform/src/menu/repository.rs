//! Menu Repository

use mongodb::{Collection, Database, bson::doc};
use futures::TryStreamExt;
use crate::menu::entity::MenuNode;
use crate::shared::error::Result;
use crate::storage::is_duplicate_key_error;

pub struct MenuRepository {
    collection: Collection<MenuNode>,
}

impl MenuRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("menu"),
        }
    }

    pub async fn insert(&self, node: &MenuNode) -> Result<()> {
        self.collection.insert_one(node).await?;
        Ok(())
    }

    /// Insert unless a node with the same (label, parent) exists.
    ///
    /// The compound unique index on label + parentId is the contract;
    /// duplicates reported by the server count as already seeded.
    pub async fn insert_if_absent(&self, node: &MenuNode) -> Result<bool> {
        match self.collection.insert_one(node).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<MenuNode>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_all(&self) -> Result<Vec<MenuNode>> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}

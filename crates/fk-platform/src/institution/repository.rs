//! Institution Repository

use mongodb::{Collection, Database, bson::doc};
use futures::TryStreamExt;
use crate::institution::entity::Institution;
use crate::shared::error::Result;
use crate::storage::is_duplicate_key_error;

pub struct InstitutionRepository {
    collection: Collection<Institution>,
}

impl InstitutionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("institutions"),
        }
    }

    pub async fn insert(&self, institution: &Institution) -> Result<()> {
        self.collection.insert_one(institution).await?;
        Ok(())
    }

    /// Insert unless an institution with the same name exists.
    pub async fn insert_if_absent(&self, institution: &Institution) -> Result<bool> {
        match self.collection.insert_one(institution).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Institution>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    /// Find an institution only while it is active. Inactive tenants are
    /// invisible to scoped members.
    pub async fn find_active_by_id(&self, id: &str) -> Result<Option<Institution>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id, "active": true })
            .await?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Institution>> {
        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    pub async fn find_all(&self) -> Result<Vec<Institution>> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find_active(&self) -> Result<Vec<Institution>> {
        let cursor = self.collection.find(doc! { "active": true }).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn update(&self, institution: &Institution) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &institution.id }, institution)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}

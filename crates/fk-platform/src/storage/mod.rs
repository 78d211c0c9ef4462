//! MongoDB Container Provisioning
//!
//! Declares every collection the platform needs, together with the unique
//! indexes that back the insert-if-absent contract, and creates them
//! idempotently on demand. Re-running provisioning against an already
//! initialized database is a no-op.

use mongodb::{Database, IndexModel, bson::{doc, Document}, options::IndexOptions};
use mongodb::error::{ErrorKind, WriteFailure};
use serde::Serialize;
use utoipa::ToSchema;
use tracing::info;

use crate::shared::error::Result;

/// Duplicate key error code (unique index violation)
const DUPLICATE_KEY: i32 = 11000;
/// Collection already exists
const NAMESPACE_EXISTS: i32 = 48;

/// A collection the platform requires, with its unique index keys.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: &'static str,
    /// Unique index key documents, one per index
    pub unique_keys: Vec<Document>,
}

impl ContainerSpec {
    fn new(name: &'static str) -> Self {
        Self { name, unique_keys: vec![] }
    }

    fn unique(mut self, keys: Document) -> Self {
        self.unique_keys.push(keys);
        self
    }
}

/// The single declaration of every container the platform uses.
///
/// The unique indexes are load-bearing: concurrent seeders rely on the
/// server rejecting duplicate inserts rather than on check-then-insert.
pub fn required_containers() -> Vec<ContainerSpec> {
    vec![
        ContainerSpec::new("users").unique(doc! { "email": 1 }),
        ContainerSpec::new("user_groups").unique(doc! { "name": 1 }),
        ContainerSpec::new("institutions").unique(doc! { "name": 1 }),
        ContainerSpec::new("menu").unique(doc! { "label": 1, "parentId": 1 }),
        ContainerSpec::new("refresh_tokens").unique(doc! { "tokenHash": 1 }),
    ]
}

/// Check whether a MongoDB error is a unique index violation.
///
/// Insert-if-absent paths treat this as "already present", not a failure.
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn is_namespace_exists_error(err: &mongodb::error::Error) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(ce) if ce.code == NAMESPACE_EXISTS)
}

/// Ensure a single container exists with its unique indexes.
///
/// Returns true if the collection was created, false if it already existed.
pub async fn ensure_container(db: &Database, spec: &ContainerSpec) -> Result<bool> {
    let created = match db.create_collection(spec.name).await {
        Ok(()) => true,
        Err(e) if is_namespace_exists_error(&e) => false,
        Err(e) => return Err(e.into()),
    };

    // create_index is idempotent for identical specs
    let collection = db.collection::<Document>(spec.name);
    for keys in &spec.unique_keys {
        collection
            .create_index(
                IndexModel::builder()
                    .keys(keys.clone())
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
    }

    Ok(created)
}

/// Report of a provisioning run
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    /// Containers created by this run
    pub created: Vec<String>,
    /// Containers that already existed
    pub existing: Vec<String>,
}

/// Create every required container. Idempotent.
pub async fn initialize_storage(db: &Database) -> Result<StorageReport> {
    let mut report = StorageReport { created: vec![], existing: vec![] };

    for spec in required_containers() {
        if ensure_container(db, &spec).await? {
            info!(container = spec.name, "Created container");
            report.created.push(spec.name.to_string());
        } else {
            report.existing.push(spec.name.to_string());
        }
    }

    info!(
        created = report.created.len(),
        existing = report.existing.len(),
        "Storage provisioning complete"
    );
    Ok(report)
}

/// Per-container document count
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub name: String,
    pub document_count: u64,
}

/// Snapshot of the database and its containers
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub database: String,
    pub containers: Vec<ContainerInfo>,
}

/// Describe the database: which required containers exist and how many
/// documents each holds. Missing containers are omitted rather than
/// created as a side effect.
pub async fn database_info(db: &Database) -> Result<DatabaseInfo> {
    let existing = db.list_collection_names().await?;

    let mut containers = Vec::new();
    for spec in required_containers() {
        if !existing.iter().any(|n| n == spec.name) {
            continue;
        }
        let count = db
            .collection::<Document>(spec.name)
            .count_documents(doc! {})
            .await?;
        containers.push(ContainerInfo {
            name: spec.name.to_string(),
            document_count: count,
        });
    }

    Ok(DatabaseInfo {
        database: db.name().to_string(),
        containers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_containers_are_declared_once() {
        let specs = required_containers();
        let names: Vec<&str> = specs.iter().map(|s| s.name).collect();

        assert!(names.contains(&"users"));
        assert!(names.contains(&"user_groups"));
        assert!(names.contains(&"institutions"));
        assert!(names.contains(&"menu"));
        assert!(names.contains(&"refresh_tokens"));

        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
    }

    #[test]
    fn test_idempotency_backing_indexes() {
        let specs = required_containers();

        let users = specs.iter().find(|s| s.name == "users").unwrap();
        assert_eq!(users.unique_keys, vec![doc! { "email": 1 }]);

        let menu = specs.iter().find(|s| s.name == "menu").unwrap();
        assert_eq!(menu.unique_keys, vec![doc! { "label": 1, "parentId": 1 }]);
    }
}

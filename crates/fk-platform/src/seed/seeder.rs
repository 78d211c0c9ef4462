//! Data Seeder
//!
//! Idempotent bootstrap state machine:
//!
//! ```text
//! Uninitialized -> ContainersReady -> GroupsSeeded -> MenuSeeded -> Ready
//! ```
//!
//! Each step asserts reference data with insert-if-absent semantics, so
//! the full sequence can be re-run any number of times without producing
//! duplicates or overwriting manual changes made between runs. The
//! seeder runs against the [`SeedStore`] contract; production wires in
//! the Mongo-backed store, tests substitute an in-memory one.

use async_trait::async_trait;
use mongodb::Database;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::catalog::SeedCatalog;
use crate::menu::entity::MenuNode;
use crate::menu::repository::MenuRepository;
use crate::shared::error::{PlatformError, Result};
use crate::storage::{self, DatabaseInfo, StorageReport};
use crate::user_group::entity::UserGroup;
use crate::user_group::repository::UserGroupRepository;

/// Bootstrap progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeedState {
    Uninitialized,
    ContainersReady,
    GroupsSeeded,
    /// Menu rows asserted but the final verification of a full run has
    /// not confirmed the database yet. A full run that cannot re-derive
    /// its state halts here.
    MenuSeeded,
    Ready,
}

impl SeedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedState::Uninitialized => "UNINITIALIZED",
            SeedState::ContainersReady => "CONTAINERS_READY",
            SeedState::GroupsSeeded => "GROUPS_SEEDED",
            SeedState::MenuSeeded => "MENU_SEEDED",
            SeedState::Ready => "READY",
        }
    }
}

/// Outcome of one seeding step
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    /// Entries inserted by this run
    pub seeded: Vec<String>,
    /// Entries already present and left untouched
    pub skipped: Vec<String>,
}

/// Outcome of a full seed sequence
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedAllReport {
    pub containers: StorageReport,
    pub user_groups: SeedReport,
    pub menu: SeedReport,
    pub state: SeedState,
}

/// Storage the seeder runs against.
///
/// The insert methods carry the idempotency contract: an entry that is
/// already present, including one inserted by a concurrent seeder,
/// reports `false` instead of an error.
#[async_trait]
pub trait SeedStore: Send + Sync {
    /// Create missing containers and their unique indexes.
    async fn ensure_containers(&self) -> Result<StorageReport>;

    /// Which required containers exist and how many documents each holds.
    async fn database_info(&self) -> Result<DatabaseInfo>;

    async fn find_group_by_name(&self, name: &str) -> Result<Option<UserGroup>>;

    /// Insert keyed by unique group name.
    async fn insert_group_if_absent(&self, group: &UserGroup) -> Result<bool>;

    async fn list_groups(&self) -> Result<Vec<UserGroup>>;

    async fn list_menu_nodes(&self) -> Result<Vec<MenuNode>>;

    /// Insert keyed by unique (label, parent).
    async fn insert_menu_node_if_absent(&self, node: &MenuNode) -> Result<bool>;
}

/// Production store backed by MongoDB and the platform repositories.
pub struct MongoSeedStore {
    db: Database,
    group_repo: Arc<UserGroupRepository>,
    menu_repo: Arc<MenuRepository>,
}

impl MongoSeedStore {
    pub fn new(
        db: Database,
        group_repo: Arc<UserGroupRepository>,
        menu_repo: Arc<MenuRepository>,
    ) -> Self {
        Self {
            db,
            group_repo,
            menu_repo,
        }
    }
}

#[async_trait]
impl SeedStore for MongoSeedStore {
    async fn ensure_containers(&self) -> Result<StorageReport> {
        storage::initialize_storage(&self.db).await
    }

    async fn database_info(&self) -> Result<DatabaseInfo> {
        storage::database_info(&self.db).await
    }

    async fn find_group_by_name(&self, name: &str) -> Result<Option<UserGroup>> {
        self.group_repo.find_by_name(name).await
    }

    async fn insert_group_if_absent(&self, group: &UserGroup) -> Result<bool> {
        self.group_repo.insert_if_absent(group).await
    }

    async fn list_groups(&self) -> Result<Vec<UserGroup>> {
        self.group_repo.find_all().await
    }

    async fn list_menu_nodes(&self) -> Result<Vec<MenuNode>> {
        self.menu_repo.find_all().await
    }

    async fn insert_menu_node_if_absent(&self, node: &MenuNode) -> Result<bool> {
        self.menu_repo.insert_if_absent(node).await
    }
}

/// Seeds canonical reference data from an injected catalog
pub struct DataSeeder {
    store: Box<dyn SeedStore>,
    catalog: SeedCatalog,
}

impl DataSeeder {
    pub fn new(store: impl SeedStore + 'static, catalog: SeedCatalog) -> Self {
        Self {
            store: Box::new(store),
            catalog,
        }
    }

    /// Derive the current bootstrap state from storage.
    ///
    /// The state is not persisted; it is recomputed so that a partially
    /// seeded database resumes from the right step.
    pub async fn current_state(&self) -> Result<SeedState> {
        let info = self.store.database_info().await?;
        let present: Vec<&str> = info.containers.iter().map(|c| c.name.as_str()).collect();
        let all_present = storage::required_containers()
            .iter()
            .all(|spec| present.contains(&spec.name));
        if !all_present {
            return Ok(SeedState::Uninitialized);
        }

        if !self.groups_seeded().await? {
            return Ok(SeedState::ContainersReady);
        }
        if !self.menu_seeded().await? {
            return Ok(SeedState::GroupsSeeded);
        }
        Ok(SeedState::Ready)
    }

    async fn groups_seeded(&self) -> Result<bool> {
        for group in &self.catalog.groups {
            if self.store.find_group_by_name(&group.name).await?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn menu_seeded(&self) -> Result<bool> {
        let existing = self.store.list_menu_nodes().await?;
        for node in &self.catalog.menu {
            let present = existing
                .iter()
                .any(|e| e.label == node.label && e.parent_id == node.parent_id);
            if !present {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Create all required containers and their unique indexes.
    /// Re-running against an initialized database is a no-op.
    pub async fn initialize(&self) -> Result<StorageReport> {
        self.store.ensure_containers().await
    }

    /// Snapshot of the containers and their document counts.
    pub async fn database_info(&self) -> Result<DatabaseInfo> {
        self.store.database_info().await
    }

    /// Insert default user groups that are not present yet, keyed by
    /// name. Existing groups keep their permission sets, so manual
    /// customization survives re-seeding.
    pub async fn seed_user_groups(&self) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for group in &self.catalog.groups {
            if self.store.find_group_by_name(&group.name).await?.is_some() {
                report.skipped.push(group.name.clone());
                continue;
            }
            // A concurrent seeder may win the race; the unique name
            // index turns that into a skip
            if self.store.insert_group_if_absent(group).await? {
                report.seeded.push(group.name.clone());
            } else {
                report.skipped.push(group.name.clone());
            }
        }

        info!(
            seeded = report.seeded.len(),
            skipped = report.skipped.len(),
            "User groups seeded"
        );
        Ok(report)
    }

    /// Insert default menu nodes that are not present yet, keyed by
    /// (label, parent). Manually added nodes are preserved.
    pub async fn seed_menu(&self) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let existing = self.store.list_menu_nodes().await?;

        for node in &self.catalog.menu {
            let present = existing
                .iter()
                .any(|e| e.label == node.label && e.parent_id == node.parent_id);
            if present {
                report.skipped.push(node.label.clone());
                continue;
            }
            if self.store.insert_menu_node_if_absent(node).await? {
                report.seeded.push(node.label.clone());
            } else {
                report.skipped.push(node.label.clone());
            }
        }

        info!(
            seeded = report.seeded.len(),
            skipped = report.skipped.len(),
            "Menu seeded"
        );
        Ok(report)
    }

    /// Run the full sequence: containers, groups, menu, then a final
    /// re-derivation of the state as verification.
    ///
    /// A failing step halts the sequence; the error names the step and
    /// the state reached, so a partial run is never ambiguous.
    pub async fn seed_all(&self) -> Result<SeedAllReport> {
        let containers = self
            .initialize()
            .await
            .map_err(|e| partial(e, "initialize", SeedState::Uninitialized))?;

        let user_groups = self
            .seed_user_groups()
            .await
            .map_err(|e| partial(e, "seedUserGroups", SeedState::ContainersReady))?;

        let menu = self
            .seed_menu()
            .await
            .map_err(|e| partial(e, "seedMenu", SeedState::GroupsSeeded))?;

        let state = self
            .current_state()
            .await
            .map_err(|e| partial(e, "verify", SeedState::MenuSeeded))?;

        Ok(SeedAllReport {
            containers,
            user_groups,
            menu,
            state,
        })
    }

    /// Dump the current user groups for backup or migration.
    pub async fn export_user_groups(&self) -> Result<Vec<UserGroup>> {
        let mut groups = self.store.list_groups().await?;
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    pub fn catalog(&self) -> &SeedCatalog {
        &self.catalog
    }
}

fn partial(source: PlatformError, step: &str, reached: SeedState) -> PlatformError {
    warn!(step, state = reached.as_str(), error = %source, "Seeding halted");
    PlatformError::PartialSeed {
        step: step.to_string(),
        state: reached.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ContainerInfo;
    use crate::user_group::entity::{operations, GroupScope};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory store sharing state across clones, mirroring the
    /// unique-index semantics of the Mongo store.
    #[derive(Clone, Default)]
    struct MemorySeedStore {
        initialized: Arc<Mutex<bool>>,
        groups: Arc<Mutex<Vec<UserGroup>>>,
        menu: Arc<Mutex<Vec<MenuNode>>>,
        info_unavailable: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl SeedStore for MemorySeedStore {
        async fn ensure_containers(&self) -> Result<StorageReport> {
            let mut initialized = self.initialized.lock().unwrap();
            let names: Vec<String> = storage::required_containers()
                .iter()
                .map(|s| s.name.to_string())
                .collect();
            let report = if *initialized {
                StorageReport { created: vec![], existing: names }
            } else {
                StorageReport { created: names, existing: vec![] }
            };
            *initialized = true;
            Ok(report)
        }

        async fn database_info(&self) -> Result<DatabaseInfo> {
            if *self.info_unavailable.lock().unwrap() {
                return Err(PlatformError::internal("Storage unavailable"));
            }
            let containers = if *self.initialized.lock().unwrap() {
                storage::required_containers()
                    .iter()
                    .map(|s| ContainerInfo {
                        name: s.name.to_string(),
                        document_count: match s.name {
                            "user_groups" => self.groups.lock().unwrap().len() as u64,
                            "menu" => self.menu.lock().unwrap().len() as u64,
                            _ => 0,
                        },
                    })
                    .collect()
            } else {
                vec![]
            };
            Ok(DatabaseInfo {
                database: "memory".to_string(),
                containers,
            })
        }

        async fn find_group_by_name(&self, name: &str) -> Result<Option<UserGroup>> {
            Ok(self
                .groups
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.name == name)
                .cloned())
        }

        async fn insert_group_if_absent(&self, group: &UserGroup) -> Result<bool> {
            let mut groups = self.groups.lock().unwrap();
            if groups.iter().any(|g| g.name == group.name) {
                return Ok(false);
            }
            groups.push(group.clone());
            Ok(true)
        }

        async fn list_groups(&self) -> Result<Vec<UserGroup>> {
            Ok(self.groups.lock().unwrap().clone())
        }

        async fn list_menu_nodes(&self) -> Result<Vec<MenuNode>> {
            Ok(self.menu.lock().unwrap().clone())
        }

        async fn insert_menu_node_if_absent(&self, node: &MenuNode) -> Result<bool> {
            let mut menu = self.menu.lock().unwrap();
            if menu
                .iter()
                .any(|e| e.label == node.label && e.parent_id == node.parent_id)
            {
                return Ok(false);
            }
            menu.push(node.clone());
            Ok(true)
        }
    }

    fn group_names(store: &MemorySeedStore) -> HashSet<String> {
        store
            .groups
            .lock()
            .unwrap()
            .iter()
            .map(|g| g.name.clone())
            .collect()
    }

    fn menu_pairs(store: &MemorySeedStore) -> HashSet<(String, Option<String>)> {
        store
            .menu
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.label.clone(), n.parent_id.clone()))
            .collect()
    }

    #[test]
    fn test_state_ordering() {
        assert!(SeedState::Uninitialized < SeedState::ContainersReady);
        assert!(SeedState::ContainersReady < SeedState::GroupsSeeded);
        assert!(SeedState::GroupsSeeded < SeedState::MenuSeeded);
        assert!(SeedState::MenuSeeded < SeedState::Ready);
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&SeedState::ContainersReady).unwrap(),
            "\"CONTAINERS_READY\""
        );
        assert_eq!(SeedState::Ready.as_str(), "READY");
    }

    #[test]
    fn test_partial_seed_error_names_step_and_state() {
        let err = partial(
            PlatformError::internal("boom"),
            "seedMenu",
            SeedState::GroupsSeeded,
        );
        let message = err.to_string();
        assert!(message.contains("seedMenu"));
        assert!(message.contains("GROUPS_SEEDED"));
    }

    #[tokio::test]
    async fn test_state_recomputed_step_by_step() {
        let store = MemorySeedStore::default();
        let seeder = DataSeeder::new(store, SeedCatalog::default());

        assert_eq!(seeder.current_state().await.unwrap(), SeedState::Uninitialized);

        seeder.initialize().await.unwrap();
        assert_eq!(seeder.current_state().await.unwrap(), SeedState::ContainersReady);

        seeder.seed_user_groups().await.unwrap();
        assert_eq!(seeder.current_state().await.unwrap(), SeedState::GroupsSeeded);

        seeder.seed_menu().await.unwrap();
        assert_eq!(seeder.current_state().await.unwrap(), SeedState::Ready);
    }

    #[tokio::test]
    async fn test_seed_all_twice_changes_nothing() {
        let store = MemorySeedStore::default();
        let seeder = DataSeeder::new(store.clone(), SeedCatalog::default());

        let first = seeder.seed_all().await.unwrap();
        assert_eq!(first.state, SeedState::Ready);
        assert_eq!(first.user_groups.seeded.len(), seeder.catalog().groups.len());
        assert_eq!(first.menu.seeded.len(), seeder.catalog().menu.len());

        let names_before = group_names(&store);
        let pairs_before = menu_pairs(&store);

        let second = seeder.seed_all().await.unwrap();
        assert_eq!(second.state, SeedState::Ready);
        assert!(second.user_groups.seeded.is_empty());
        assert!(second.menu.seeded.is_empty());
        assert_eq!(second.user_groups.skipped.len(), seeder.catalog().groups.len());

        assert_eq!(group_names(&store), names_before);
        assert_eq!(menu_pairs(&store), pairs_before);
    }

    #[tokio::test]
    async fn test_reseed_adds_new_group_without_touching_existing() {
        let store = MemorySeedStore::default();
        DataSeeder::new(store.clone(), SeedCatalog::default())
            .seed_all()
            .await
            .unwrap();

        // Manual customization between runs
        {
            let mut groups = store.groups.lock().unwrap();
            let user = groups.iter_mut().find(|g| g.name == "User").unwrap();
            user.permissions.insert(operations::INSTITUTION_READ.to_string());
        }

        let mut extended = SeedCatalog::default();
        extended.groups.push(
            UserGroup::new("Auditor", GroupScope::InstitutionScoped)
                .with_permission(operations::USER_READ),
        );

        let report = DataSeeder::new(store.clone(), extended)
            .seed_user_groups()
            .await
            .unwrap();
        assert_eq!(report.seeded, vec!["Auditor".to_string()]);

        let groups = store.groups.lock().unwrap();
        let user = groups.iter().find(|g| g.name == "User").unwrap();
        assert!(user.permissions.contains(operations::INSTITUTION_READ));
    }

    #[tokio::test]
    async fn test_concurrent_seeders_never_duplicate() {
        let store = MemorySeedStore::default();
        let a = DataSeeder::new(store.clone(), SeedCatalog::default());
        let b = DataSeeder::new(store.clone(), SeedCatalog::default());

        let (ra, rb) = tokio::join!(a.seed_all(), b.seed_all());
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        // Every entry landed exactly once
        let catalog = SeedCatalog::default();
        assert_eq!(store.groups.lock().unwrap().len(), catalog.groups.len());
        assert_eq!(store.menu.lock().unwrap().len(), catalog.menu.len());

        let seeded_by_a: HashSet<&String> = ra.user_groups.seeded.iter().collect();
        let seeded_by_b: HashSet<&String> = rb.user_groups.seeded.iter().collect();
        assert!(seeded_by_a.is_disjoint(&seeded_by_b));
    }

    #[tokio::test]
    async fn test_failed_verification_halts_at_menu_seeded() {
        let store = MemorySeedStore::default();
        *store.info_unavailable.lock().unwrap() = true;

        let err = DataSeeder::new(store, SeedCatalog::default())
            .seed_all()
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("verify"));
        assert!(message.contains("MENU_SEEDED"));
    }
}

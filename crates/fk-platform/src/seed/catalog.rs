//! Seed Catalog
//!
//! Canonical reference data asserted by the seeder: the default user
//! groups and the default menu tree. The catalog is an immutable value
//! injected into the seeder, so tests can substitute their own.

use crate::menu::entity::MenuNode;
use crate::user_group::entity::{operations, GroupScope, UserGroup};

/// Fixed IDs for seeded entities. Seeded rows get stable human-readable
/// IDs so menu allow-lists and default group assignment can reference
/// them without a lookup.
pub mod ids {
    pub const GROUP_SYSTEM_ADMIN: &str = "system-admin";
    pub const GROUP_INSTITUTION_ADMIN: &str = "institution-admin";
    pub const GROUP_USER: &str = "user";
    pub const GROUP_GUEST: &str = "guest";

    pub const MENU_DASHBOARD: &str = "dashboard";
    pub const MENU_USERS: &str = "users";
    pub const MENU_INSTITUTIONS: &str = "institutions";
    pub const MENU_USER_GROUPS: &str = "user-groups";
}

/// Canonical reference data for bootstrap
#[derive(Debug, Clone)]
pub struct SeedCatalog {
    pub groups: Vec<UserGroup>,
    pub menu: Vec<MenuNode>,
}

impl SeedCatalog {
    /// Group assigned to self-registered accounts
    pub fn default_registration_group() -> &'static str {
        ids::GROUP_USER
    }
}

impl Default for SeedCatalog {
    fn default() -> Self {
        let groups = vec![
            UserGroup::new("SystemAdmin", GroupScope::SystemWide)
                .with_id(ids::GROUP_SYSTEM_ADMIN)
                .with_description("Platform administrators with cross-institution reach")
                .with_permissions(operations::ALL.iter().copied()),
            UserGroup::new("InstitutionAdmin", GroupScope::InstitutionScoped)
                .with_id(ids::GROUP_INSTITUTION_ADMIN)
                .with_description("Administrators of a single institution")
                .with_permission(operations::USER_READ)
                .with_permission(operations::USER_CREATE)
                .with_permission(operations::USER_UPDATE)
                .with_permission(operations::USER_DELETE)
                .with_permission(operations::GROUP_READ)
                .with_permission(operations::INSTITUTION_READ)
                .with_permission(operations::MENU_READ),
            UserGroup::new("User", GroupScope::InstitutionScoped)
                .with_id(ids::GROUP_USER)
                .with_description("Regular institution members")
                .with_permission(operations::USER_READ)
                .with_permission(operations::MENU_READ),
            UserGroup::new("Guest", GroupScope::InstitutionScoped)
                .with_id(ids::GROUP_GUEST)
                .with_description("Read-only visitors")
                .with_permission(operations::MENU_READ),
        ];

        let all_groups = vec![
            ids::GROUP_SYSTEM_ADMIN.to_string(),
            ids::GROUP_INSTITUTION_ADMIN.to_string(),
            ids::GROUP_USER.to_string(),
            ids::GROUP_GUEST.to_string(),
        ];
        let admins = vec![
            ids::GROUP_SYSTEM_ADMIN.to_string(),
            ids::GROUP_INSTITUTION_ADMIN.to_string(),
        ];

        let menu = vec![
            MenuNode::new("Dashboard")
                .with_id(ids::MENU_DASHBOARD)
                .with_order(0)
                .with_allowed_groups(all_groups)
                .with_icon("home")
                .with_url("/"),
            MenuNode::new("Users")
                .with_id(ids::MENU_USERS)
                .with_parent(ids::MENU_DASHBOARD)
                .with_order(1)
                .with_allowed_groups(admins.clone())
                .with_icon("users")
                .with_url("/admin/users"),
            MenuNode::new("Institutions")
                .with_id(ids::MENU_INSTITUTIONS)
                .with_parent(ids::MENU_DASHBOARD)
                .with_order(2)
                .with_allowed_groups(vec![ids::GROUP_SYSTEM_ADMIN.to_string()])
                .with_icon("building")
                .with_url("/admin/institutions"),
            MenuNode::new("User Groups")
                .with_id(ids::MENU_USER_GROUPS)
                .with_parent(ids::MENU_DASHBOARD)
                .with_order(3)
                .with_allowed_groups(admins)
                .with_icon("shield")
                .with_url("/admin/user-groups"),
        ];

        Self { groups, menu }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::entity::MenuTree;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_group_names_unique() {
        let catalog = SeedCatalog::default();
        let names: HashSet<&str> = catalog.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names.len(), catalog.groups.len());
    }

    #[test]
    fn test_exactly_one_system_wide_group() {
        let catalog = SeedCatalog::default();
        let system_wide = catalog.groups.iter().filter(|g| g.is_system_wide()).count();
        assert_eq!(system_wide, 1);
    }

    #[test]
    fn test_registration_group_exists() {
        let catalog = SeedCatalog::default();
        assert!(catalog
            .groups
            .iter()
            .any(|g| g.id == SeedCatalog::default_registration_group()));
    }

    #[test]
    fn test_menu_forms_valid_tree() {
        let catalog = SeedCatalog::default();
        let tree = MenuTree::from_nodes(catalog.menu).unwrap();
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_menu_allow_lists_reference_catalog_groups() {
        let catalog = SeedCatalog::default();
        let group_ids: HashSet<&str> = catalog.groups.iter().map(|g| g.id.as_str()).collect();
        for node in &catalog.menu {
            for allowed in &node.allowed_groups {
                assert!(
                    group_ids.contains(allowed.as_str()),
                    "menu node '{}' allows unknown group '{}'",
                    node.id,
                    allowed
                );
            }
        }
    }
}

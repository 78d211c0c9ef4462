//! Platform Integration Tests
//!
//! Tests for domain models, menu visibility, permission checks, token
//! round-trips, and the seed catalog.

use std::collections::HashSet;

use fk_platform::auth::auth_service::{AuthConfig, AuthService};
use fk_platform::seed::catalog::{ids, SeedCatalog};
use fk_platform::user_group::entity::operations;
use fk_platform::{GroupScope, MenuNode, MenuTree, User, UserGroup};

mod group_tests {
    use super::*;

    #[test]
    fn test_system_wide_group_permits_every_operation() {
        let group = UserGroup::new("Platform Ops", GroupScope::SystemWide);
        for op in operations::ALL {
            assert!(group.is_permitted(op));
        }
    }

    #[test]
    fn test_scoped_group_permits_only_listed_operations() {
        let group = UserGroup::new("Members", GroupScope::InstitutionScoped)
            .with_permission(operations::MENU_READ);

        assert!(group.is_permitted(operations::MENU_READ));
        assert!(!group.is_permitted(operations::USER_DELETE));
        assert!(!group.is_permitted("menu"));
    }

    #[test]
    fn test_group_scope_is_structural_not_nominal() {
        let pretender = UserGroup::new("SystemAdmin", GroupScope::InstitutionScoped);
        assert!(!pretender.is_system_wide());
        assert!(!pretender.is_permitted(operations::INSTITUTION_CREATE));
    }
}

mod menu_tests {
    use super::*;

    fn catalog_tree() -> MenuTree {
        MenuTree::from_nodes(SeedCatalog::default().menu).unwrap()
    }

    #[test]
    fn test_guest_sees_only_dashboard() {
        let tree = catalog_tree();
        let menu = tree.visible_menu(ids::GROUP_GUEST, GroupScope::InstitutionScoped);

        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Dashboard");
        assert!(menu[0].children.is_empty());
    }

    #[test]
    fn test_system_admin_sees_full_tree() {
        let tree = catalog_tree();
        let menu = tree.visible_menu(ids::GROUP_SYSTEM_ADMIN, GroupScope::SystemWide);

        assert_eq!(menu.len(), 1);
        let dashboard = &menu[0];
        assert_eq!(dashboard.label, "Dashboard");

        let children: Vec<&str> = dashboard.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(children, vec!["Users", "Institutions", "User Groups"]);
    }

    #[test]
    fn test_institution_admin_does_not_see_institutions_entry() {
        let tree = catalog_tree();
        let menu = tree.visible_menu(ids::GROUP_INSTITUTION_ADMIN, GroupScope::InstitutionScoped);

        let children: Vec<&str> = menu[0].children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(children, vec!["Users", "User Groups"]);
    }

    #[test]
    fn test_hidden_parent_hides_allowed_child() {
        let nodes = vec![
            MenuNode::new("Admin Area")
                .with_id("admin-area")
                .with_allowed_groups(vec!["admins".to_string()]),
            MenuNode::new("Reports")
                .with_id("reports")
                .with_parent("admin-area")
                .with_allowed_groups(vec!["members".to_string()]),
        ];
        let tree = MenuTree::from_nodes(nodes).unwrap();

        // Reports allows members directly, but its parent does not
        let menu = tree.visible_menu("members", GroupScope::InstitutionScoped);
        assert!(menu.is_empty());
    }

    #[test]
    fn test_no_orphaned_visible_nodes() {
        let tree = catalog_tree();
        for group in [
            ids::GROUP_GUEST,
            ids::GROUP_USER,
            ids::GROUP_INSTITUTION_ADMIN,
        ] {
            let menu = tree.visible_menu(group, GroupScope::InstitutionScoped);
            // Every visible child arrived nested under a visible parent,
            // so the top level must contain only root nodes
            for item in &menu {
                assert_eq!(tree.get(&item.id).unwrap().parent_id, None);
            }
        }
    }

    #[test]
    fn test_empty_allow_list_is_admin_only() {
        let nodes = vec![MenuNode::new("Internal").with_id("internal")];
        let tree = MenuTree::from_nodes(nodes).unwrap();

        assert!(tree
            .visible_menu("anyone", GroupScope::InstitutionScoped)
            .is_empty());
        assert_eq!(tree.visible_menu("ops", GroupScope::SystemWide).len(), 1);
    }
}

mod auth_tests {
    use super::*;

    fn auth_service() -> AuthService {
        AuthService::new(AuthConfig {
            secret_key: "integration-test-secret".to_string(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = auth_service();
        let user = User::new("jane@example.com", "Jane", "Doe", "hash".to_string(), ids::GROUP_USER)
            .with_institution("inst-1");

        let token = service.generate_access_token(&user).unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "jane@example.com");
        assert_eq!(claims.name, "Jane Doe");
        assert_eq!(claims.group_id, ids::GROUP_USER);
        assert_eq!(claims.institution_id.as_deref(), Some("inst-1"));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let user = User::new("jane@example.com", "Jane", "Doe", "hash".to_string(), ids::GROUP_USER);
        let token = auth_service().generate_access_token(&user).unwrap();

        let other = AuthService::new(AuthConfig {
            secret_key: "a-different-secret".to_string(),
            ..AuthConfig::default()
        });
        assert!(other.validate_token(&token).is_err());
    }
}

mod catalog_tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_the_four_groups() {
        let catalog = SeedCatalog::default();
        let names: HashSet<&str> = catalog.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            HashSet::from(["SystemAdmin", "InstitutionAdmin", "User", "Guest"])
        );
    }

    #[test]
    fn test_default_catalog_has_one_system_wide_group() {
        let catalog = SeedCatalog::default();
        let system_wide: Vec<&UserGroup> = catalog
            .groups
            .iter()
            .filter(|g| g.is_system_wide())
            .collect();
        assert_eq!(system_wide.len(), 1);
        assert_eq!(system_wide[0].id, ids::GROUP_SYSTEM_ADMIN);
    }

    #[test]
    fn test_catalog_menu_pairs_are_unique() {
        // (label, parent) is the idempotency key for menu seeding
        let catalog = SeedCatalog::default();
        let pairs: HashSet<(String, Option<String>)> = catalog
            .menu
            .iter()
            .map(|n| (n.label.clone(), n.parent_id.clone()))
            .collect();
        assert_eq!(pairs.len(), catalog.menu.len());
    }

    #[test]
    fn test_guest_group_cannot_touch_users() {
        let catalog = SeedCatalog::default();
        let guest = catalog
            .groups
            .iter()
            .find(|g| g.id == ids::GROUP_GUEST)
            .unwrap();

        assert!(guest.is_permitted(operations::MENU_READ));
        assert!(!guest.is_permitted(operations::USER_READ));
        assert!(!guest.is_permitted(operations::USER_DELETE));
    }
}

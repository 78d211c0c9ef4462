//! Menu Entities
//!
//! Menu items are stored as a flat arena of nodes with parent references.
//! `MenuTree` validates the arena (unique ids, resolvable parents, no
//! cycles) and derives the child adjacency; visibility filtering is a pure
//! function over the validated tree.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::user_group::entity::GroupScope;

/// A single menu entry.
///
/// `allowed_groups` lists the group ids whose members may see this node.
/// An empty list means no scoped group sees it; system-wide members see
/// every node regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    #[serde(rename = "_id")]
    pub id: String,

    /// Display label (unique among siblings of the same parent)
    pub label: String,

    /// Parent node id, None for roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Sibling sort key; ties break on id
    #[serde(default)]
    pub order: i32,

    /// Group ids allowed to see this node
    #[serde(default)]
    pub allowed_groups: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Audit fields
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl MenuNode {
    pub fn new(label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            parent_id: None,
            order: 0,
            allowed_groups: vec![],
            icon: None,
            url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with a fixed id, for catalog-seeded nodes.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_allowed_groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Whether a member of `group_id` with the given scope may see this
    /// node (ignoring ancestors). Structural scope check, never a name
    /// comparison.
    pub fn is_visible_to(&self, group_id: &str, scope: GroupScope) -> bool {
        scope == GroupScope::SystemWide
            || self.allowed_groups.iter().any(|g| g == group_id)
    }
}

/// A visible menu entry, with its visible children
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisibleMenuItem {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub children: Vec<VisibleMenuItem>,
}

/// Validated menu arena with derived child adjacency.
pub struct MenuTree {
    nodes: HashMap<String, MenuNode>,
    /// Children of each node, and of the virtual root (None)
    children: HashMap<Option<String>, Vec<String>>,
}

impl MenuTree {
    /// Build a tree from a flat arena.
    ///
    /// Rejects duplicate ids, parent references that do not resolve, and
    /// cycles. A stored arena that fails here indicates corrupt data, not
    /// a caller mistake.
    pub fn from_nodes(nodes: Vec<MenuNode>) -> Result<Self> {
        let mut by_id: HashMap<String, MenuNode> = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if by_id.insert(node.id.clone(), node).is_some() {
                return Err(PlatformError::validation("Menu contains duplicate node ids"));
            }
        }

        for node in by_id.values() {
            if let Some(parent) = &node.parent_id {
                if parent == &node.id {
                    return Err(PlatformError::validation(format!(
                        "Menu node '{}' is its own parent",
                        node.id
                    )));
                }
                if !by_id.contains_key(parent) {
                    return Err(PlatformError::validation(format!(
                        "Menu node '{}' references missing parent '{}'",
                        node.id, parent
                    )));
                }
            }
        }

        // Cycle check: walk each node's ancestor chain. Every chain must
        // terminate at a root within |nodes| steps.
        for node in by_id.values() {
            let mut seen: HashSet<&str> = HashSet::new();
            seen.insert(node.id.as_str());
            let mut current = node.parent_id.as_deref();
            while let Some(parent_id) = current {
                if !seen.insert(parent_id) {
                    return Err(PlatformError::validation(format!(
                        "Menu contains a cycle through node '{}'",
                        parent_id
                    )));
                }
                current = by_id
                    .get(parent_id)
                    .and_then(|p| p.parent_id.as_deref());
            }
        }

        let mut children: HashMap<Option<String>, Vec<String>> = HashMap::new();
        for node in by_id.values() {
            children
                .entry(node.parent_id.clone())
                .or_default()
                .push(node.id.clone());
        }

        // Deterministic sibling order: (order, id)
        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let na = &by_id[a];
                let nb = &by_id[b];
                na.order.cmp(&nb.order).then_with(|| na.id.cmp(&nb.id))
            });
        }

        Ok(Self { nodes: by_id, children })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MenuNode> {
        self.nodes.get(id)
    }

    /// Compute the menu as seen by a member of `group_id` with the given
    /// scope. A node appears only if it is visible itself and every
    /// ancestor is visible; hidden parents hide whole subtrees. Pure:
    /// same tree and caller always produce the same result.
    pub fn visible_menu(&self, group_id: &str, scope: GroupScope) -> Vec<VisibleMenuItem> {
        self.visible_children(&None, group_id, scope)
    }

    fn visible_children(
        &self,
        parent: &Option<String>,
        group_id: &str,
        scope: GroupScope,
    ) -> Vec<VisibleMenuItem> {
        let Some(ids) = self.children.get(parent) else {
            return vec![];
        };

        ids.iter()
            .filter_map(|id| {
                let node = &self.nodes[id];
                if !node.is_visible_to(group_id, scope) {
                    return None;
                }
                Some(VisibleMenuItem {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    icon: node.icon.clone(),
                    url: node.url.clone(),
                    children: self.visible_children(&Some(node.id.clone()), group_id, scope),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> MenuTree {
        let dashboard = MenuNode::new("Dashboard")
            .with_id("dashboard")
            .with_order(0)
            .with_allowed_groups(["system-admin", "institution-admin", "user", "guest"]);
        let users = MenuNode::new("Users")
            .with_id("users")
            .with_parent("dashboard")
            .with_order(1)
            .with_allowed_groups(["system-admin", "institution-admin"]);
        let institutions = MenuNode::new("Institutions")
            .with_id("institutions")
            .with_parent("dashboard")
            .with_order(2)
            .with_allowed_groups(["system-admin"]);
        let groups = MenuNode::new("User Groups")
            .with_id("user-groups")
            .with_parent("dashboard")
            .with_order(3)
            .with_allowed_groups(["system-admin", "institution-admin"]);

        MenuTree::from_nodes(vec![dashboard, users, institutions, groups]).unwrap()
    }

    fn labels(items: &[VisibleMenuItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn test_guest_sees_only_dashboard() {
        let tree = sample_tree();
        let menu = tree.visible_menu("guest", GroupScope::InstitutionScoped);

        assert_eq!(labels(&menu), vec!["Dashboard"]);
        assert!(menu[0].children.is_empty());
    }

    #[test]
    fn test_system_admin_sees_everything() {
        let tree = sample_tree();
        let menu = tree.visible_menu("system-admin", GroupScope::SystemWide);

        assert_eq!(labels(&menu), vec!["Dashboard"]);
        assert_eq!(
            labels(&menu[0].children),
            vec!["Users", "Institutions", "User Groups"]
        );
    }

    #[test]
    fn test_institution_admin_subset() {
        let tree = sample_tree();
        let menu = tree.visible_menu("institution-admin", GroupScope::InstitutionScoped);

        assert_eq!(labels(&menu[0].children), vec!["Users", "User Groups"]);
    }

    #[test]
    fn test_hidden_parent_hides_subtree() {
        // Child allows the group, parent does not: subtree stays hidden.
        let parent = MenuNode::new("Admin")
            .with_id("admin")
            .with_allowed_groups(["system-admin"]);
        let child = MenuNode::new("Settings")
            .with_id("settings")
            .with_parent("admin")
            .with_allowed_groups(["user"]);
        let tree = MenuTree::from_nodes(vec![parent, child]).unwrap();

        let menu = tree.visible_menu("user", GroupScope::InstitutionScoped);
        assert!(menu.is_empty());
    }

    #[test]
    fn test_empty_allow_list_hidden_from_scoped_groups() {
        let node = MenuNode::new("Internal").with_id("internal");
        let tree = MenuTree::from_nodes(vec![node]).unwrap();

        assert!(tree.visible_menu("user", GroupScope::InstitutionScoped).is_empty());
        // System-wide members still see it
        assert_eq!(
            labels(&tree.visible_menu("ops", GroupScope::SystemWide)),
            vec!["Internal"]
        );
    }

    #[test]
    fn test_sibling_order_ties_break_on_id() {
        let a = MenuNode::new("B-label").with_id("b").with_order(1).with_allowed_groups(["g"]);
        let b = MenuNode::new("A-label").with_id("a").with_order(1).with_allowed_groups(["g"]);
        let c = MenuNode::new("C-label").with_id("c").with_order(0).with_allowed_groups(["g"]);
        let tree = MenuTree::from_nodes(vec![a, b, c]).unwrap();

        let menu = tree.visible_menu("g", GroupScope::InstitutionScoped);
        let ids: Vec<&str> = menu.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_rejects_missing_parent() {
        let orphan = MenuNode::new("Orphan").with_id("orphan").with_parent("ghost");
        assert!(MenuTree::from_nodes(vec![orphan]).is_err());
    }

    #[test]
    fn test_rejects_cycle() {
        let mut a = MenuNode::new("A").with_id("a");
        let b = MenuNode::new("B").with_id("b").with_parent("a");
        a.parent_id = Some("b".to_string());
        assert!(MenuTree::from_nodes(vec![a, b]).is_err());
    }

    #[test]
    fn test_rejects_self_parent() {
        let node = MenuNode::new("Loop").with_id("loop").with_parent("loop");
        assert!(MenuTree::from_nodes(vec![node]).is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let a = MenuNode::new("One").with_id("dup");
        let b = MenuNode::new("Two").with_id("dup");
        assert!(MenuTree::from_nodes(vec![a, b]).is_err());
    }
}

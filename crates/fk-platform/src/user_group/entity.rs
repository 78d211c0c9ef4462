//! User Group Entity
//!
//! Authorization model: every user belongs to exactly one group, and a
//! group grants a flat set of operation permissions. The group's scope
//! decides whether its members see across institutions or only their own.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use std::collections::HashSet;
use utoipa::ToSchema;

/// Reach of a group's members across tenants.
///
/// Access decisions compare this variant structurally; group names carry
/// no authorization meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupScope {
    /// Members operate across all institutions
    SystemWide,
    /// Members are confined to their own institution
    InstitutionScoped,
}

impl Default for GroupScope {
    fn default() -> Self {
        Self::InstitutionScoped
    }
}

/// User group definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGroup {
    #[serde(rename = "_id")]
    pub id: String,

    /// Group name (unique)
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tenant reach of this group's members
    #[serde(default)]
    pub scope: GroupScope,

    /// Operations granted to members. Flat set, no inheritance.
    #[serde(default)]
    pub permissions: HashSet<String>,

    /// Audit fields
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserGroup {
    pub fn new(name: impl Into<String>, scope: GroupScope) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            scope,
            permissions: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with a fixed id. Seeded groups use stable ids so that
    /// repeated seeding converges instead of multiplying.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for p in permissions {
            self.permissions.insert(p.into());
        }
        self
    }

    pub fn grant_permission(&mut self, permission: impl Into<String>) {
        self.permissions.insert(permission.into());
        self.updated_at = Utc::now();
    }

    pub fn revoke_permission(&mut self, permission: &str) {
        self.permissions.remove(permission);
        self.updated_at = Utc::now();
    }

    /// Permission check. System-wide groups are permitted everything;
    /// all other groups grant exactly the operations they list, with no
    /// wildcard or prefix semantics.
    pub fn is_permitted(&self, operation: &str) -> bool {
        self.is_system_wide() || self.permissions.contains(operation)
    }

    pub fn is_system_wide(&self) -> bool {
        self.scope == GroupScope::SystemWide
    }
}

/// Platform operations - format: {entity}.{action}
pub mod operations {
    pub const USER_READ: &str = "user.read";
    pub const USER_CREATE: &str = "user.create";
    pub const USER_UPDATE: &str = "user.update";
    pub const USER_DELETE: &str = "user.delete";

    pub const INSTITUTION_READ: &str = "institution.read";
    pub const INSTITUTION_CREATE: &str = "institution.create";
    pub const INSTITUTION_UPDATE: &str = "institution.update";
    pub const INSTITUTION_DELETE: &str = "institution.delete";

    pub const GROUP_READ: &str = "group.read";
    pub const GROUP_CREATE: &str = "group.create";
    pub const GROUP_DELETE: &str = "group.delete";

    pub const MENU_READ: &str = "menu.read";

    pub const DATABASE_READ: &str = "database.read";

    /// All operations
    pub const ALL: &[&str] = &[
        USER_READ, USER_CREATE, USER_UPDATE, USER_DELETE,
        INSTITUTION_READ, INSTITUTION_CREATE, INSTITUTION_UPDATE, INSTITUTION_DELETE,
        GROUP_READ, GROUP_CREATE, GROUP_DELETE,
        MENU_READ,
        DATABASE_READ,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_permission_matching() {
        let group = UserGroup::new("Reviewers", GroupScope::InstitutionScoped)
            .with_permission(operations::USER_READ)
            .with_permission(operations::MENU_READ);

        assert!(group.is_permitted(operations::USER_READ));
        assert!(group.is_permitted(operations::MENU_READ));
        assert!(!group.is_permitted(operations::USER_DELETE));
        // No prefix or wildcard semantics
        assert!(!group.is_permitted("user"));
        assert!(!group.is_permitted("user.*"));
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut group = UserGroup::new("Ops", GroupScope::InstitutionScoped);
        assert!(!group.is_permitted(operations::GROUP_CREATE));

        group.grant_permission(operations::GROUP_CREATE);
        assert!(group.is_permitted(operations::GROUP_CREATE));

        group.revoke_permission(operations::GROUP_CREATE);
        assert!(!group.is_permitted(operations::GROUP_CREATE));
    }

    #[test]
    fn test_system_wide_permits_everything() {
        let group = UserGroup::new("Platform Ops", GroupScope::SystemWide);
        for op in operations::ALL {
            assert!(group.is_permitted(op), "system-wide group denied {}", op);
        }
    }

    #[test]
    fn test_scope_is_structural() {
        // A group named like an admin but scoped to its institution
        // must not be treated as system wide.
        let group = UserGroup::new("SystemAdmin", GroupScope::InstitutionScoped);
        assert!(!group.is_system_wide());

        let group = UserGroup::new("Interns", GroupScope::SystemWide);
        assert!(group.is_system_wide());
    }

    #[test]
    fn test_scope_serialization() {
        assert_eq!(
            serde_json::to_string(&GroupScope::SystemWide).unwrap(),
            "\"SYSTEM_WIDE\""
        );
        assert_eq!(
            serde_json::to_string(&GroupScope::InstitutionScoped).unwrap(),
            "\"INSTITUTION_SCOPED\""
        );
    }
}

//! Authorization Service
//!
//! Builds per-request authorization contexts and enforces permission and
//! institution-scope checks. Group membership and permissions are looked
//! up fresh on every request, so revoking a permission takes effect on
//! the next call rather than at token expiry.

use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::auth_service::AccessTokenClaims;
use crate::institution::repository::InstitutionRepository;
use crate::shared::error::{PlatformError, Result};
use crate::user::repository::UserRepository;
use crate::user_group::entity::GroupScope;
use crate::user_group::repository::UserGroupRepository;

/// Authorization context for a request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID
    pub user_id: String,

    /// Email
    pub email: String,

    /// Display name
    pub name: String,

    /// Group the user belongs to
    pub group_id: String,

    /// Group name (display only, carries no authorization meaning)
    pub group_name: String,

    /// Tenant reach of the user's group
    pub scope: GroupScope,

    /// Institution membership
    pub institution_id: Option<String>,

    /// Permissions granted by the group
    pub permissions: HashSet<String>,
}

impl AuthContext {
    pub fn is_system_wide(&self) -> bool {
        self.scope == GroupScope::SystemWide
    }

    /// Permission check, mirroring the group's semantics: system-wide
    /// scope permits everything, any other scope grants exactly the
    /// listed operations.
    pub fn is_permitted(&self, operation: &str) -> bool {
        self.is_system_wide() || self.permissions.contains(operation)
    }

    /// Whether this context may touch a record with the given institution
    /// attribution. System-wide members reach everything; scoped members
    /// reach only records attributed to their own institution. A scoped
    /// member with no institution, or a record with none, is out of reach.
    pub fn can_access_institution(&self, record_institution: Option<&str>) -> bool {
        if self.is_system_wide() {
            return true;
        }
        match (self.institution_id.as_deref(), record_institution) {
            (Some(own), Some(record)) => own == record,
            _ => false,
        }
    }
}

/// Authorization service for building contexts and enforcing checks
pub struct AuthorizationService {
    user_repo: Arc<UserRepository>,
    group_repo: Arc<UserGroupRepository>,
    institution_repo: Arc<InstitutionRepository>,
}

impl AuthorizationService {
    pub fn new(
        user_repo: Arc<UserRepository>,
        group_repo: Arc<UserGroupRepository>,
        institution_repo: Arc<InstitutionRepository>,
    ) -> Self {
        Self {
            user_repo,
            group_repo,
            institution_repo,
        }
    }

    /// Build an authorization context from JWT claims.
    ///
    /// Resolves the user and group from storage; a lookup failure
    /// propagates and the request fails closed.
    pub async fn build_context(&self, claims: &AccessTokenClaims) -> Result<AuthContext> {
        let user = self
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| PlatformError::unauthorized("Unknown user"))?;

        if !user.active {
            return Err(PlatformError::unauthorized("Account is not active"));
        }

        let group = self
            .group_repo
            .find_by_id(&user.group_id)
            .await?
            .ok_or_else(|| PlatformError::unauthorized("User group no longer exists"))?;

        // A scoped identity is only usable while its institution is active;
        // system-wide identities carry no such dependency
        if group.scope != GroupScope::SystemWide {
            if let Some(ref institution_id) = user.institution_id {
                if self
                    .institution_repo
                    .find_active_by_id(institution_id)
                    .await?
                    .is_none()
                {
                    return Err(PlatformError::unauthorized("Institution is not active"));
                }
            }
        }

        let name = user.full_name();
        Ok(AuthContext {
            user_id: user.id,
            email: user.email,
            name,
            group_id: group.id,
            group_name: group.name,
            scope: group.scope,
            institution_id: user.institution_id,
            permissions: group.permissions,
        })
    }

    /// Require a specific permission
    pub fn require_permission(&self, context: &AuthContext, operation: &str) -> Result<()> {
        require_permission(context, operation)
    }

    /// Require access to a record's institution
    pub fn require_institution_access(
        &self,
        context: &AuthContext,
        record_institution: Option<&str>,
    ) -> Result<()> {
        require_institution_access(context, record_institution)
    }
}

/// Require a specific permission
pub fn require_permission(context: &AuthContext, operation: &str) -> Result<()> {
    if context.is_permitted(operation) {
        Ok(())
    } else {
        Err(PlatformError::forbidden(format!(
            "Missing permission: {}",
            operation
        )))
    }
}

/// Require access to a record's institution. Checked before permissions
/// so that scoped callers learn nothing about foreign tenants.
pub fn require_institution_access(
    context: &AuthContext,
    record_institution: Option<&str>,
) -> Result<()> {
    if context.can_access_institution(record_institution) {
        Ok(())
    } else {
        Err(PlatformError::forbidden("No access to this institution"))
    }
}

/// Require system-wide scope
pub fn require_system_wide(context: &AuthContext) -> Result<()> {
    if context.is_system_wide() {
        Ok(())
    } else {
        Err(PlatformError::forbidden("System-wide scope required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped_context(institution: Option<&str>, permissions: Vec<&str>) -> AuthContext {
        AuthContext {
            user_id: "u1".to_string(),
            email: "user@example.com".to_string(),
            name: "Test User".to_string(),
            group_id: "g1".to_string(),
            group_name: "Members".to_string(),
            scope: GroupScope::InstitutionScoped,
            institution_id: institution.map(String::from),
            permissions: permissions.into_iter().map(String::from).collect(),
        }
    }

    fn system_context() -> AuthContext {
        AuthContext {
            scope: GroupScope::SystemWide,
            institution_id: None,
            ..scoped_context(None, vec![])
        }
    }

    #[test]
    fn test_exact_permission() {
        let ctx = scoped_context(Some("inst-1"), vec!["user.read"]);
        assert!(ctx.is_permitted("user.read"));
        assert!(!ctx.is_permitted("user.delete"));
        assert!(!ctx.is_permitted("user"));
    }

    #[test]
    fn test_system_wide_reaches_everything() {
        let ctx = system_context();
        assert!(ctx.can_access_institution(Some("inst-1")));
        assert!(ctx.can_access_institution(Some("inst-2")));
        assert!(ctx.can_access_institution(None));
    }

    #[test]
    fn test_system_wide_is_permitted_everything() {
        let ctx = system_context();
        assert!(ctx.is_permitted("user.delete"));
        assert!(ctx.is_permitted("institution.create"));
    }

    #[test]
    fn test_scoped_reaches_own_institution_only() {
        let ctx = scoped_context(Some("inst-1"), vec![]);
        assert!(ctx.can_access_institution(Some("inst-1")));
        assert!(!ctx.can_access_institution(Some("inst-2")));
        assert!(!ctx.can_access_institution(None));
    }

    #[test]
    fn test_scoped_without_institution_reaches_nothing() {
        let ctx = scoped_context(None, vec![]);
        assert!(!ctx.can_access_institution(Some("inst-1")));
        assert!(!ctx.can_access_institution(None));
    }

    #[test]
    fn test_require_helpers() {
        let ctx = scoped_context(Some("inst-1"), vec!["menu.read"]);

        assert!(require_permission(&ctx, "menu.read").is_ok());
        assert!(require_permission(&ctx, "user.delete").is_err());
        assert!(require_institution_access(&ctx, Some("inst-1")).is_ok());
        assert!(require_institution_access(&ctx, Some("inst-2")).is_err());
        assert!(require_system_wide(&ctx).is_err());
        assert!(require_system_wide(&system_context()).is_ok());
    }
}

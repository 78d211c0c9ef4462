//! User Groups Admin API
//!
//! REST endpoints for user group management. Groups are platform-level
//! definitions; creating and deleting them is a system-wide operation.

use axum::{
    extract::{Path, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::entity::{operations, GroupScope, UserGroup};
use super::repository::UserGroupRepository;
use crate::shared::api_common::{CreatedResponse, SuccessResponse};
use crate::shared::authorization_service::{require_permission, require_system_wide};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::repository::UserRepository;

/// Create user group request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserGroupRequest {
    /// Unique name
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Scope of the group
    pub scope: GroupScope,

    /// Granted operations
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// User group response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserGroupResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scope: GroupScope,
    pub permissions: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserGroup> for UserGroupResponse {
    fn from(g: UserGroup) -> Self {
        let mut permissions: Vec<String> = g.permissions.into_iter().collect();
        permissions.sort();
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
            scope: g.scope,
            permissions,
            created_at: g.created_at.to_rfc3339(),
            updated_at: g.updated_at.to_rfc3339(),
        }
    }
}

/// User group list response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserGroupListResponse {
    pub groups: Vec<UserGroupResponse>,
    pub total: usize,
}

/// User groups service state
#[derive(Clone)]
pub struct UserGroupsState {
    pub group_repo: Arc<UserGroupRepository>,
    pub user_repo: Arc<UserRepository>,
}

/// Exactly one group may hold the system-wide scope. Creating a second
/// one is refused, never merged.
fn ensure_single_system_wide(
    requested: GroupScope,
    existing: Option<&UserGroup>,
) -> Result<(), PlatformError> {
    if requested == GroupScope::SystemWide && existing.is_some() {
        return Err(PlatformError::conflict(
            "A system-wide group already exists",
        ));
    }
    Ok(())
}

fn validate_permissions(permissions: &[String]) -> Result<(), PlatformError> {
    for permission in permissions {
        if !operations::ALL.contains(&permission.as_str()) {
            return Err(PlatformError::validation(format!(
                "Unknown operation: {}",
                permission
            )));
        }
    }
    Ok(())
}

/// Create a new user group
#[utoipa::path(
    post,
    path = "",
    tag = "user-groups",
    operation_id = "postApiAdminUserGroups",
    request_body = CreateUserGroupRequest,
    responses(
        (status = 201, description = "User group created", body = CreatedResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user_group(
    State(state): State<UserGroupsState>,
    auth: Authenticated,
    Json(req): Json<CreateUserGroupRequest>,
) -> Result<Json<CreatedResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::GROUP_CREATE)?;

    if req.name.trim().is_empty() {
        return Err(PlatformError::validation("Name must not be empty"));
    }
    validate_permissions(&req.permissions)?;
    ensure_single_system_wide(req.scope, state.group_repo.find_system_wide().await?.as_ref())?;

    let mut group = UserGroup::new(req.name.trim(), req.scope).with_permissions(req.permissions);
    if let Some(description) = req.description {
        group = group.with_description(description);
    }

    let id = group.id.clone();
    if !state.group_repo.insert_if_absent(&group).await? {
        return Err(PlatformError::duplicate("UserGroup", "name", &group.name));
    }

    info!(group_id = %id, created_by = %auth.0.user_id, "User group created");

    Ok(Json(CreatedResponse::new(id)))
}

/// Get user group by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "user-groups",
    operation_id = "getApiAdminUserGroupsById",
    params(
        ("id" = String, Path, description = "User group ID")
    ),
    responses(
        (status = 200, description = "User group found", body = UserGroupResponse),
        (status = 404, description = "User group not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_group(
    State(state): State<UserGroupsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<UserGroupResponse>, PlatformError> {
    require_permission(&auth.0, operations::GROUP_READ)?;

    let group = state
        .group_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("UserGroup", &id))?;

    Ok(Json(group.into()))
}

/// List user groups
#[utoipa::path(
    get,
    path = "",
    tag = "user-groups",
    operation_id = "getApiAdminUserGroups",
    responses(
        (status = 200, description = "List of user groups", body = UserGroupListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_user_groups(
    State(state): State<UserGroupsState>,
    auth: Authenticated,
) -> Result<Json<UserGroupListResponse>, PlatformError> {
    require_permission(&auth.0, operations::GROUP_READ)?;

    let mut groups = state.group_repo.find_all().await?;
    groups.sort_by(|a, b| a.name.cmp(&b.name));

    let total = groups.len();
    let groups = groups.into_iter().map(UserGroupResponse::from).collect();

    Ok(Json(UserGroupListResponse { groups, total }))
}

/// Delete a user group
///
/// Refused while any user still references the group.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "user-groups",
    operation_id = "deleteApiAdminUserGroupsById",
    params(
        ("id" = String, Path, description = "User group ID")
    ),
    responses(
        (status = 200, description = "User group deleted", body = SuccessResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User group not found"),
        (status = 409, description = "Group still referenced by users")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user_group(
    State(state): State<UserGroupsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::GROUP_DELETE)?;

    if id == auth.0.group_id {
        return Err(PlatformError::validation("Cannot delete your own group"));
    }

    if !state.group_repo.exists(&id).await? {
        return Err(PlatformError::not_found("UserGroup", &id));
    }

    let members = state.user_repo.count_by_group(&id).await?;
    if members > 0 {
        return Err(PlatformError::conflict(format!(
            "Group still assigned to {} users",
            members
        )));
    }

    state.group_repo.delete(&id).await?;

    info!(group_id = %id, deleted_by = %auth.0.user_id, "User group deleted");

    Ok(Json(SuccessResponse::with_message("User group deleted")))
}

/// Create the user groups router
pub fn user_groups_router(state: UserGroupsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_user_group, list_user_groups))
        .routes(routes!(get_user_group, delete_user_group))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_with_scope() {
        let json = r#"{
            "name": "Auditors",
            "scope": "INSTITUTION_SCOPED",
            "permissions": ["user.read", "menu.read"]
        }"#;
        let req: CreateUserGroupRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.scope, GroupScope::InstitutionScoped);
        assert_eq!(req.permissions.len(), 2);
    }

    #[test]
    fn test_validate_permissions_rejects_unknown() {
        let known = vec![operations::USER_READ.to_string()];
        assert!(validate_permissions(&known).is_ok());

        let unknown = vec!["user.read".to_string(), "billing.read".to_string()];
        assert!(validate_permissions(&unknown).is_err());
    }

    #[test]
    fn test_second_system_wide_group_is_refused() {
        let existing = UserGroup::new("Platform Admins", GroupScope::SystemWide);

        let result = ensure_single_system_wide(GroupScope::SystemWide, Some(&existing));
        assert!(matches!(result, Err(PlatformError::Conflict { .. })));

        // Scoped groups are unrestricted, and the first system-wide one passes
        assert!(ensure_single_system_wide(GroupScope::InstitutionScoped, Some(&existing)).is_ok());
        assert!(ensure_single_system_wide(GroupScope::SystemWide, None).is_ok());
    }

    #[test]
    fn test_response_sorts_permissions() {
        let group = UserGroup::new("Ops", GroupScope::SystemWide)
            .with_permission(operations::MENU_READ)
            .with_permission(operations::GROUP_READ);
        let response: UserGroupResponse = group.into();
        assert_eq!(response.permissions, vec!["group.read", "menu.read"]);
    }
}

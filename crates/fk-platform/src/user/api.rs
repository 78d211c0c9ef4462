//! Users Admin API
//!
//! REST endpoints for user management. Listing and mutation are always
//! filtered through the caller's institution scope.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::entity::User;
use super::repository::UserRepository;
use crate::auth::password_service::PasswordService;
use crate::auth::refresh_token_repository::RefreshTokenRepository;
use crate::institution::repository::InstitutionRepository;
use crate::shared::api_common::{PaginationParams, SuccessResponse};
use crate::shared::authorization_service::{require_institution_access, require_permission};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user_group::entity::operations;
use crate::user_group::repository::UserGroupRepository;

/// Create user request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Email address (login identifier)
    pub email: String,

    /// Given name
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// Initial password. When omitted, one is generated and returned once
    /// in the create response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// User group
    pub group_id: String,

    /// Institution the user belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
}

/// Update user request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    /// Given name
    pub first_name: Option<String>,

    /// Family name
    pub last_name: Option<String>,

    /// User group
    pub group_id: Option<String>,

    /// Active flag
    pub active: Option<bool>,

    /// New password. Changing your own requires `currentPassword`;
    /// resetting someone else's requires the system-wide scope.
    pub password: Option<String>,

    /// Current password, verified when a user changes their own
    pub current_password: Option<String>,
}

/// Create user response
///
/// `generated_password` is only present when the request omitted a
/// password; it is shown exactly once and never stored in clear.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

/// User response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            group_id: u.group_id,
            institution_id: u.institution_id,
            active: u.active,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

/// User list response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: usize,
}

/// Users service state
#[derive(Clone)]
pub struct UsersState {
    pub user_repo: Arc<UserRepository>,
    pub group_repo: Arc<UserGroupRepository>,
    pub institution_repo: Arc<InstitutionRepository>,
    pub password_service: Arc<PasswordService>,
    pub refresh_token_repo: Arc<RefreshTokenRepository>,
}

/// Create a new user
#[utoipa::path(
    post,
    path = "",
    tag = "users",
    operation_id = "postApiAdminUsers",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate email")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, PlatformError> {
    require_permission(&auth.0, operations::USER_CREATE)?;
    require_institution_access(&auth.0, req.institution_id.as_deref())?;

    let group = state
        .group_repo
        .find_by_id(&req.group_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("UserGroup", &req.group_id))?;

    // Scoped callers cannot place a user in a system-wide group
    if group.is_system_wide() && !auth.0.is_system_wide() {
        return Err(PlatformError::forbidden(
            "Cannot assign a system-wide group",
        ));
    }

    if let Some(ref institution_id) = req.institution_id {
        let institution = state
            .institution_repo
            .find_by_id(institution_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Institution", institution_id))?;
        if !institution.is_active() {
            return Err(PlatformError::validation("Institution is not active"));
        }
    }

    let (password, generated_password) = match req.password {
        Some(password) => (password, None),
        None => {
            let generated = state.password_service.policy().generate_password();
            (generated.clone(), Some(generated))
        }
    };
    let password_hash = state.password_service.hash_password(&password)?;

    if req.first_name.trim().is_empty() {
        return Err(PlatformError::validation("First name must not be empty"));
    }

    let mut user = User::new(
        &req.email,
        req.first_name.trim(),
        req.last_name.trim(),
        password_hash,
        &req.group_id,
    );
    if let Some(institution_id) = req.institution_id {
        user = user.with_institution(institution_id);
    }

    let id = user.id.clone();
    if !state.user_repo.insert_if_absent(&user).await? {
        return Err(PlatformError::duplicate("User", "email", &user.email));
    }

    info!(user_id = %id, created_by = %auth.0.user_id, "User created");

    Ok(Json(CreateUserResponse { id, generated_password }))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "users",
    operation_id = "getApiAdminUsersById",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, PlatformError> {
    require_permission(&auth.0, operations::USER_READ)?;

    let user = state
        .user_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    require_institution_access(&auth.0, user.institution_id.as_deref())?;

    Ok(Json(user.into()))
}

/// List users
///
/// System-wide callers see all users; institution-scoped callers see
/// only users of their own institution.
#[utoipa::path(
    get,
    path = "",
    tag = "users",
    operation_id = "getApiAdminUsers",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "List of users", body = UserListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<UsersState>,
    auth: Authenticated,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<UserListResponse>, PlatformError> {
    require_permission(&auth.0, operations::USER_READ)?;

    let all = if auth.0.is_system_wide() {
        state.user_repo.find_all().await?
    } else {
        match auth.0.institution_id.as_deref() {
            Some(institution_id) => state.user_repo.find_by_institution(institution_id).await?,
            // A scoped caller without an institution reaches nothing
            None => Vec::new(),
        }
    };

    let total = all.len();
    let users = all
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .map(UserResponse::from)
        .collect();

    Ok(Json(UserListResponse { users, total }))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "users",
    operation_id = "putApiAdminUsersById",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = SuccessResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    require_permission(&auth.0, operations::USER_UPDATE)?;

    let mut user = state
        .user_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    require_institution_access(&auth.0, user.institution_id.as_deref())?;

    if let Some(first_name) = req.first_name {
        if first_name.trim().is_empty() {
            return Err(PlatformError::validation("First name must not be empty"));
        }
        user.first_name = first_name.trim().to_string();
    }

    if let Some(last_name) = req.last_name {
        user.last_name = last_name.trim().to_string();
    }

    if let Some(group_id) = req.group_id {
        let group = state
            .group_repo
            .find_by_id(&group_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("UserGroup", &group_id))?;
        if group.is_system_wide() && !auth.0.is_system_wide() {
            return Err(PlatformError::forbidden(
                "Cannot assign a system-wide group",
            ));
        }
        user.group_id = group.id;
    }

    if let Some(active) = req.active {
        // Deactivation also invalidates outstanding refresh tokens
        if user.active && !active {
            state.refresh_token_repo.revoke_all_for_user(&user.id).await?;
        }
        user.active = active;
    }

    if let Some(password) = req.password {
        if auth.0.user_id == user.id {
            let current = req
                .current_password
                .ok_or_else(|| PlatformError::validation("Current password is required"))?;
            if !state.password_service.verify_password(&current, &user.password_hash)? {
                return Err(PlatformError::unauthorized("Current password is incorrect"));
            }
        } else if !auth.0.is_system_wide() {
            return Err(PlatformError::forbidden(
                "Only system-wide administrators can reset passwords",
            ));
        }
        user.password_hash = state.password_service.hash_password(&password)?;
        // A changed password closes every open session
        state.refresh_token_repo.revoke_all_for_user(&user.id).await?;
    }

    user.updated_at = chrono::Utc::now();
    state.user_repo.update(&user).await?;

    Ok(Json(SuccessResponse::ok()))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "users",
    operation_id = "deleteApiAdminUsersById",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = SuccessResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    require_permission(&auth.0, operations::USER_DELETE)?;

    if id == auth.0.user_id {
        return Err(PlatformError::validation("Cannot delete your own account"));
    }

    let user = state
        .user_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    require_institution_access(&auth.0, user.institution_id.as_deref())?;

    // Members of system-wide groups are only deletable by system-wide callers
    if let Some(group) = state.group_repo.find_by_id(&user.group_id).await? {
        if group.is_system_wide() && !auth.0.is_system_wide() {
            return Err(PlatformError::forbidden(
                "Cannot delete a system-wide user",
            ));
        }
    }

    state.user_repo.delete(&id).await?;
    let revoked = state.refresh_token_repo.revoke_all_for_user(&id).await?;

    info!(user_id = %id, revoked_tokens = revoked, deleted_by = %auth.0.user_id, "User deleted");

    Ok(Json(SuccessResponse::ok()))
}

/// Create the users router
pub fn users_router(state: UsersState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_user, list_users))
        .routes(routes!(get_user, update_user, delete_user))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_request_deserialization() {
        let json = r#"{
            "email": "new@example.com",
            "firstName": "New",
            "lastName": "User",
            "password": "CorrectHorse#42Staple",
            "groupId": "user",
            "institutionId": "inst-1"
        }"#;
        let req: CreateUserRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.email, "new@example.com");
        assert_eq!(req.first_name, "New");
        assert_eq!(req.last_name, "User");
        assert_eq!(req.group_id, "user");
        assert_eq!(req.password.as_deref(), Some("CorrectHorse#42Staple"));
        assert_eq!(req.institution_id.as_deref(), Some("inst-1"));
    }

    #[test]
    fn test_create_user_request_without_password() {
        let json =
            r#"{"email":"new@example.com","firstName":"New","lastName":"User","groupId":"user"}"#;
        let req: CreateUserRequest = serde_json::from_str(json).unwrap();
        assert!(req.password.is_none());
    }

    #[test]
    fn test_create_user_response_hides_absent_generated_password() {
        let response = CreateUserResponse {
            id: "u1".to_string(),
            generated_password: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("generatedPassword"));
    }

    #[test]
    fn test_update_request_password_fields() {
        let json = r#"{"password":"NewPass#42ok","currentPassword":"OldPass#42ok"}"#;
        let req: UpdateUserRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.password.as_deref(), Some("NewPass#42ok"));
        assert_eq!(req.current_password.as_deref(), Some("OldPass#42ok"));
        assert!(req.first_name.is_none());
        assert!(req.last_name.is_none());
    }

    #[test]
    fn test_user_response_omits_missing_institution() {
        let user = User::new("ops@example.com", "Ops", "Team", "hash".to_string(), "system-admin");
        let response: UserResponse = user.into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("institutionId"));
        assert!(json.contains("groupId"));
        assert!(json.contains("firstName"));
        assert!(json.contains("lastName"));
    }
}

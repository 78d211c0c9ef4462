//! Institutions Admin API
//!
//! REST endpoints for institution management. Creation and deletion are
//! system-wide operations; scoped callers can only read their own
//! institution.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::entity::Institution;
use super::repository::InstitutionRepository;
use crate::shared::api_common::{CreatedResponse, PaginationParams, SuccessResponse};
use crate::shared::authorization_service::{
    require_institution_access, require_permission, require_system_wide,
};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::repository::UserRepository;
use crate::user_group::entity::operations;

/// Create institution request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstitutionRequest {
    /// Unique name
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Update institution request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstitutionRequest {
    /// Unique name
    pub name: Option<String>,

    /// Description
    pub description: Option<String>,

    /// Active flag
    pub active: Option<bool>,
}

/// Institution response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Institution> for InstitutionResponse {
    fn from(i: Institution) -> Self {
        Self {
            id: i.id,
            name: i.name,
            description: i.description,
            active: i.active,
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.to_rfc3339(),
        }
    }
}

/// Institution list response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionListResponse {
    pub institutions: Vec<InstitutionResponse>,
    pub total: usize,
}

/// Delete institution response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteInstitutionResponse {
    pub success: bool,
    /// Users detached from the institution
    pub detached_users: u64,
}

/// Institutions service state
#[derive(Clone)]
pub struct InstitutionsState {
    pub institution_repo: Arc<InstitutionRepository>,
    pub user_repo: Arc<UserRepository>,
}

/// Create a new institution
#[utoipa::path(
    post,
    path = "",
    tag = "institutions",
    operation_id = "postApiAdminInstitutions",
    request_body = CreateInstitutionRequest,
    responses(
        (status = 201, description = "Institution created", body = CreatedResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_institution(
    State(state): State<InstitutionsState>,
    auth: Authenticated,
    Json(req): Json<CreateInstitutionRequest>,
) -> Result<Json<CreatedResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::INSTITUTION_CREATE)?;

    if req.name.trim().is_empty() {
        return Err(PlatformError::validation("Name must not be empty"));
    }

    let mut institution = Institution::new(req.name.trim());
    if let Some(description) = req.description {
        institution = institution.with_description(description);
    }

    let id = institution.id.clone();
    if !state.institution_repo.insert_if_absent(&institution).await? {
        return Err(PlatformError::duplicate("Institution", "name", &institution.name));
    }

    info!(institution_id = %id, created_by = %auth.0.user_id, "Institution created");

    Ok(Json(CreatedResponse::new(id)))
}

/// Get institution by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "institutions",
    operation_id = "getApiAdminInstitutionsById",
    params(
        ("id" = String, Path, description = "Institution ID")
    ),
    responses(
        (status = 200, description = "Institution found", body = InstitutionResponse),
        (status = 404, description = "Institution not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_institution(
    State(state): State<InstitutionsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<InstitutionResponse>, PlatformError> {
    require_permission(&auth.0, operations::INSTITUTION_READ)?;
    require_institution_access(&auth.0, Some(&id))?;

    let institution = state
        .institution_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Institution", &id))?;

    Ok(Json(institution.into()))
}

/// List institutions
///
/// System-wide callers see all institutions; scoped callers see only
/// their own.
#[utoipa::path(
    get,
    path = "",
    tag = "institutions",
    operation_id = "getApiAdminInstitutions",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "List of institutions", body = InstitutionListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_institutions(
    State(state): State<InstitutionsState>,
    auth: Authenticated,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<InstitutionListResponse>, PlatformError> {
    require_permission(&auth.0, operations::INSTITUTION_READ)?;

    let all = if auth.0.is_system_wide() {
        state.institution_repo.find_all().await?
    } else {
        // Scoped callers see only their own institution, and only while
        // it is active
        match auth.0.institution_id.as_deref() {
            Some(own) => state
                .institution_repo
                .find_active_by_id(own)
                .await?
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    };

    let total = all.len();
    let institutions = all
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .map(InstitutionResponse::from)
        .collect();

    Ok(Json(InstitutionListResponse { institutions, total }))
}

/// Update an institution
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "institutions",
    operation_id = "putApiAdminInstitutionsById",
    params(
        ("id" = String, Path, description = "Institution ID")
    ),
    request_body = UpdateInstitutionRequest,
    responses(
        (status = 200, description = "Institution updated", body = SuccessResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Institution not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_institution(
    State(state): State<InstitutionsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateInstitutionRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::INSTITUTION_UPDATE)?;

    let mut institution = state
        .institution_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Institution", &id))?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(PlatformError::validation("Name must not be empty"));
        }
        if name != institution.name {
            if let Some(existing) = state.institution_repo.find_by_name(name.trim()).await? {
                if existing.id != institution.id {
                    return Err(PlatformError::duplicate("Institution", "name", name.trim()));
                }
            }
        }
        institution.name = name.trim().to_string();
    }

    if let Some(description) = req.description {
        institution.description = Some(description);
    }

    if let Some(active) = req.active {
        institution.active = active;
    }

    institution.updated_at = chrono::Utc::now();
    state.institution_repo.update(&institution).await?;

    Ok(Json(SuccessResponse::ok()))
}

/// Delete an institution
///
/// Detaches all users from the institution, then deactivates it. User
/// accounts survive; they lose their tenant association and scoped
/// members can no longer log in until reassigned.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "institutions",
    operation_id = "deleteApiAdminInstitutionsById",
    params(
        ("id" = String, Path, description = "Institution ID")
    ),
    responses(
        (status = 200, description = "Institution deleted", body = DeleteInstitutionResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Institution not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_institution(
    State(state): State<InstitutionsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<DeleteInstitutionResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::INSTITUTION_DELETE)?;

    let mut institution = state
        .institution_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Institution", &id))?;

    let detached_users = state.user_repo.detach_all_from_institution(&id).await?;

    institution.deactivate();
    state.institution_repo.update(&institution).await?;

    info!(
        institution_id = %id,
        detached_users,
        deleted_by = %auth.0.user_id,
        "Institution deleted"
    );

    Ok(Json(DeleteInstitutionResponse {
        success: true,
        detached_users,
    }))
}

/// Create the institutions router
pub fn institutions_router(state: InstitutionsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_institution, list_institutions))
        .routes(routes!(get_institution, update_institution, delete_institution))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_deserialization() {
        let json = r#"{"name":"Acme University","description":"Pilot tenant"}"#;
        let req: CreateInstitutionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Acme University");
        assert_eq!(req.description.as_deref(), Some("Pilot tenant"));
    }

    #[test]
    fn test_response_serialization() {
        let institution = Institution::new("Acme");
        let response: InstitutionResponse = institution.into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"active\":true"));
        assert!(json.contains("createdAt"));
        assert!(!json.contains("description"));
    }
}

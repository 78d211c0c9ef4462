//! Database Bootstrap API
//!
//! Provisioning and seeding endpoints. The mutation endpoints are
//! idempotent and safe to re-run; they are left unauthenticated so a
//! fresh deployment can be bootstrapped before any user exists. The
//! read endpoints require the `database.read` operation.

use axum::{extract::State, Json};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::seeder::{DataSeeder, SeedAllReport, SeedReport, SeedState};
use crate::shared::authorization_service::require_permission;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::storage::{DatabaseInfo, StorageReport};
use crate::user_group::entity::{operations, GroupScope, UserGroup};

/// Database status response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatusResponse {
    #[serde(flatten)]
    pub info: DatabaseInfo,
    pub state: SeedState,
}

/// Exported user group
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportedUserGroup {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scope: GroupScope,
    pub permissions: Vec<String>,
}

impl From<UserGroup> for ExportedUserGroup {
    fn from(g: UserGroup) -> Self {
        let mut permissions: Vec<String> = g.permissions.into_iter().collect();
        permissions.sort();
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
            scope: g.scope,
            permissions,
        }
    }
}

/// User groups export response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportUserGroupsResponse {
    pub groups: Vec<ExportedUserGroup>,
    pub total: usize,
}

/// Project setup response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetupProjectResponse {
    pub message: String,
    pub initialization: StorageReport,
    pub seeding: SeedAllReport,
}

/// Bootstrap service state
#[derive(Clone)]
pub struct SeedApiState {
    pub seeder: Arc<DataSeeder>,
}

/// Initialize the database
///
/// Creates all required containers and unique indexes. Idempotent.
#[utoipa::path(
    post,
    path = "/initialize",
    tag = "database",
    operation_id = "postApiDatabaseInitialize",
    responses(
        (status = 200, description = "Containers provisioned", body = StorageReport),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn initialize_database(
    State(state): State<SeedApiState>,
) -> Result<Json<StorageReport>, PlatformError> {
    Ok(Json(state.seeder.initialize().await?))
}

/// Get database status
#[utoipa::path(
    get,
    path = "/info",
    tag = "database",
    operation_id = "getApiDatabaseInfo",
    responses(
        (status = 200, description = "Database status", body = DatabaseStatusResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_database_info(
    State(state): State<SeedApiState>,
    auth: Authenticated,
) -> Result<Json<DatabaseStatusResponse>, PlatformError> {
    require_permission(&auth.0, operations::DATABASE_READ)?;

    let seed_state = state.seeder.current_state().await?;
    let info = state.seeder.database_info().await?;

    Ok(Json(DatabaseStatusResponse {
        info,
        state: seed_state,
    }))
}

/// Seed default user groups
#[utoipa::path(
    post,
    path = "/seed/user-groups",
    tag = "database",
    operation_id = "postApiDatabaseSeedUserGroups",
    responses(
        (status = 200, description = "User groups asserted", body = SeedReport)
    )
)]
pub async fn seed_user_groups(
    State(state): State<SeedApiState>,
) -> Result<Json<SeedReport>, PlatformError> {
    Ok(Json(state.seeder.seed_user_groups().await?))
}

/// Seed the default menu
#[utoipa::path(
    post,
    path = "/seed/menu",
    tag = "database",
    operation_id = "postApiDatabaseSeedMenu",
    responses(
        (status = 200, description = "Menu asserted", body = SeedReport)
    )
)]
pub async fn seed_menu(
    State(state): State<SeedApiState>,
) -> Result<Json<SeedReport>, PlatformError> {
    Ok(Json(state.seeder.seed_menu().await?))
}

/// Seed all reference data
#[utoipa::path(
    post,
    path = "/seed/all",
    tag = "database",
    operation_id = "postApiDatabaseSeedAll",
    responses(
        (status = 200, description = "Full seed complete", body = SeedAllReport),
        (status = 500, description = "Seeding halted mid-sequence")
    )
)]
pub async fn seed_all(
    State(state): State<SeedApiState>,
) -> Result<Json<SeedAllReport>, PlatformError> {
    Ok(Json(state.seeder.seed_all().await?))
}

/// Export user groups
///
/// Dumps the current user groups for backup or migration.
#[utoipa::path(
    get,
    path = "/export/user-groups",
    tag = "database",
    operation_id = "getApiDatabaseExportUserGroups",
    responses(
        (status = 200, description = "Current user groups", body = ExportUserGroupsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_user_groups(
    State(state): State<SeedApiState>,
    auth: Authenticated,
) -> Result<Json<ExportUserGroupsResponse>, PlatformError> {
    require_permission(&auth.0, operations::DATABASE_READ)?;

    let groups: Vec<ExportedUserGroup> = state
        .seeder
        .export_user_groups()
        .await?
        .into_iter()
        .map(ExportedUserGroup::from)
        .collect();
    let total = groups.len();

    Ok(Json(ExportUserGroupsResponse { groups, total }))
}

/// Set up a new project
///
/// Runs initialization and the full seed sequence in one call.
#[utoipa::path(
    post,
    path = "/setup-new-project",
    tag = "database",
    operation_id = "postApiDatabaseSetupNewProject",
    responses(
        (status = 200, description = "Project set up", body = SetupProjectResponse),
        (status = 500, description = "Setup halted mid-sequence")
    )
)]
pub async fn setup_new_project(
    State(state): State<SeedApiState>,
) -> Result<Json<SetupProjectResponse>, PlatformError> {
    let initialization = state.seeder.initialize().await?;
    let seeding = state.seeder.seed_all().await?;

    info!("New project setup completed");

    Ok(Json(SetupProjectResponse {
        message: "New project setup completed successfully".to_string(),
        initialization,
        seeding,
    }))
}

/// Create the database bootstrap router
pub fn database_router(state: SeedApiState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(initialize_database))
        .routes(routes!(get_database_info))
        .routes(routes!(seed_user_groups))
        .routes(routes!(seed_menu))
        .routes(routes!(seed_all))
        .routes(routes!(export_user_groups))
        .routes(routes!(setup_new_project))
        .with_state(state)
}

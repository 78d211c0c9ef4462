//! Platform Stats API
//!
//! Entity counts for dashboards. Scoped callers get counts narrowed to
//! their own institution.

use axum::{extract::State, Json};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::Serialize;
use std::sync::Arc;

use crate::institution::repository::InstitutionRepository;
use crate::menu::repository::MenuRepository;
use crate::shared::authorization_service::require_permission;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::repository::UserRepository;
use crate::user_group::entity::operations;
use crate::user_group::repository::UserGroupRepository;

/// Entity counts response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CountsResponse {
    pub users: u64,
    pub user_groups: u64,
    pub institutions: u64,
    pub menu_nodes: u64,
}

/// Stats service state
#[derive(Clone)]
pub struct StatsState {
    pub user_repo: Arc<UserRepository>,
    pub group_repo: Arc<UserGroupRepository>,
    pub institution_repo: Arc<InstitutionRepository>,
    pub menu_repo: Arc<MenuRepository>,
}

/// Get entity counts
#[utoipa::path(
    get,
    path = "/counts",
    tag = "stats",
    operation_id = "getApiAdminStatsCounts",
    responses(
        (status = 200, description = "Entity counts", body = CountsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_counts(
    State(state): State<StatsState>,
    auth: Authenticated,
) -> Result<Json<CountsResponse>, PlatformError> {
    require_permission(&auth.0, operations::DATABASE_READ)?;

    let (users, institutions) = if auth.0.is_system_wide() {
        (
            state.user_repo.count().await?,
            state.institution_repo.count().await?,
        )
    } else {
        match auth.0.institution_id.as_deref() {
            Some(own) => (state.user_repo.count_by_institution(own).await?, 1),
            None => (0, 0),
        }
    };

    Ok(Json(CountsResponse {
        users,
        user_groups: state.group_repo.count().await?,
        institutions,
        menu_nodes: state.menu_repo.count().await?,
    }))
}

/// Create the stats router
pub fn stats_router(state: StatsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_counts))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::authorization_service::AuthContext;
    use crate::user_group::entity::GroupScope;

    fn context_with(permissions: Vec<&str>) -> AuthContext {
        AuthContext {
            user_id: "u1".to_string(),
            email: "user@example.com".to_string(),
            name: "Test User".to_string(),
            group_id: "g1".to_string(),
            group_name: "Members".to_string(),
            scope: GroupScope::InstitutionScoped,
            institution_id: Some("inst-1".to_string()),
            permissions: permissions.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_counts_require_database_read() {
        let without = context_with(vec!["user.read"]);
        assert!(require_permission(&without, operations::DATABASE_READ).is_err());

        let with = context_with(vec![operations::DATABASE_READ]);
        assert!(require_permission(&with, operations::DATABASE_READ).is_ok());
    }
}

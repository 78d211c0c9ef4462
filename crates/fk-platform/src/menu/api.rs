//! Menu API
//!
//! The main endpoint returns the menu tree filtered for the caller's
//! group. Node management endpoints are system-wide operations; every
//! mutation is validated against the full tree before it is persisted.

use axum::{
    extract::{Path, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::entity::{MenuNode, MenuTree, VisibleMenuItem};
use super::repository::MenuRepository;
use crate::shared::api_common::{CreatedResponse, SuccessResponse};
use crate::shared::authorization_service::{require_permission, require_system_wide};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user_group::entity::operations;

/// Create menu node request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuNodeRequest {
    /// Display label
    pub label: String,

    /// Parent node; root when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Sort order among siblings
    #[serde(default)]
    pub order: i32,

    /// Group IDs allowed to see the node
    #[serde(default)]
    pub allowed_groups: Vec<String>,

    /// Icon name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Link target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Menu node response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuNodeResponse {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub order: i32,
    pub allowed_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<MenuNode> for MenuNodeResponse {
    fn from(n: MenuNode) -> Self {
        Self {
            id: n.id,
            label: n.label,
            parent_id: n.parent_id,
            order: n.order,
            allowed_groups: n.allowed_groups,
            icon: n.icon,
            url: n.url,
        }
    }
}

/// Menu node list response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuNodeListResponse {
    pub nodes: Vec<MenuNodeResponse>,
    pub total: usize,
}

/// Visible menu response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisibleMenuResponse {
    pub items: Vec<VisibleMenuItem>,
}

/// Menu service state
#[derive(Clone)]
pub struct MenuState {
    pub menu_repo: Arc<MenuRepository>,
}

async fn load_tree(repo: &MenuRepository) -> Result<MenuTree, PlatformError> {
    let nodes = repo.find_all().await?;
    // Stored nodes already passed validation; a failure here means the
    // collection was edited out of band
    MenuTree::from_nodes(nodes)
        .map_err(|e| PlatformError::internal(format!("Stored menu is invalid: {}", e)))
}

/// Get the visible menu
///
/// Returns the menu tree filtered for the caller's group and scope.
/// A node is included only when the caller may see it and its whole
/// ancestor chain is visible.
#[utoipa::path(
    get,
    path = "",
    tag = "menu",
    operation_id = "getApiMenu",
    responses(
        (status = 200, description = "Visible menu for the caller", body = VisibleMenuResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_visible_menu(
    State(state): State<MenuState>,
    auth: Authenticated,
) -> Result<Json<VisibleMenuResponse>, PlatformError> {
    require_permission(&auth.0, operations::MENU_READ)?;

    let tree = load_tree(&state.menu_repo).await?;
    let items = tree.visible_menu(&auth.0.group_id, auth.0.scope);

    Ok(Json(VisibleMenuResponse { items }))
}

/// List all menu nodes
#[utoipa::path(
    get,
    path = "/nodes",
    tag = "menu",
    operation_id = "getApiMenuNodes",
    responses(
        (status = 200, description = "All menu nodes", body = MenuNodeListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_menu_nodes(
    State(state): State<MenuState>,
    auth: Authenticated,
) -> Result<Json<MenuNodeListResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::MENU_READ)?;

    let mut nodes = state.menu_repo.find_all().await?;
    nodes.sort_by(|a, b| (a.order, &a.id).cmp(&(b.order, &b.id)));

    let total = nodes.len();
    let nodes = nodes.into_iter().map(MenuNodeResponse::from).collect();

    Ok(Json(MenuNodeListResponse { nodes, total }))
}

/// Create a menu node
#[utoipa::path(
    post,
    path = "/nodes",
    tag = "menu",
    operation_id = "postApiMenuNodes",
    request_body = CreateMenuNodeRequest,
    responses(
        (status = 201, description = "Node created", body = CreatedResponse),
        (status = 400, description = "Node would break the tree"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate label under parent")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_menu_node(
    State(state): State<MenuState>,
    auth: Authenticated,
    Json(req): Json<CreateMenuNodeRequest>,
) -> Result<Json<CreatedResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::MENU_READ)?;

    if req.label.trim().is_empty() {
        return Err(PlatformError::validation("Label must not be empty"));
    }

    let mut node = MenuNode::new(req.label.trim())
        .with_order(req.order)
        .with_allowed_groups(req.allowed_groups);
    if let Some(parent_id) = req.parent_id {
        node = node.with_parent(parent_id);
    }
    if let Some(icon) = req.icon {
        node = node.with_icon(icon);
    }
    if let Some(url) = req.url {
        node = node.with_url(url);
    }

    // Validate the tree with the new node in place before persisting
    let mut nodes = state.menu_repo.find_all().await?;
    nodes.push(node.clone());
    MenuTree::from_nodes(nodes)?;

    let id = node.id.clone();
    if !state.menu_repo.insert_if_absent(&node).await? {
        return Err(PlatformError::duplicate("MenuNode", "label", &node.label));
    }

    info!(node_id = %id, created_by = %auth.0.user_id, "Menu node created");

    Ok(Json(CreatedResponse::new(id)))
}

/// Delete a menu node
///
/// Refused while the node still has children.
#[utoipa::path(
    delete,
    path = "/nodes/{id}",
    tag = "menu",
    operation_id = "deleteApiMenuNodesById",
    params(
        ("id" = String, Path, description = "Menu node ID")
    ),
    responses(
        (status = 200, description = "Node deleted", body = SuccessResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Node not found"),
        (status = 409, description = "Node still has children")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_menu_node(
    State(state): State<MenuState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    require_system_wide(&auth.0)?;
    require_permission(&auth.0, operations::MENU_READ)?;

    let nodes = state.menu_repo.find_all().await?;
    if !nodes.iter().any(|n| n.id == id) {
        return Err(PlatformError::not_found("MenuNode", &id));
    }
    if nodes.iter().any(|n| n.parent_id.as_deref() == Some(id.as_str())) {
        return Err(PlatformError::conflict("Menu node still has children"));
    }

    state.menu_repo.delete(&id).await?;

    info!(node_id = %id, deleted_by = %auth.0.user_id, "Menu node deleted");

    Ok(Json(SuccessResponse::ok()))
}

/// Create the menu router
pub fn menu_router(state: MenuState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_visible_menu))
        .routes(routes!(list_menu_nodes, create_menu_node))
        .routes(routes!(delete_menu_node))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let json = r#"{"label":"Reports"}"#;
        let req: CreateMenuNodeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.label, "Reports");
        assert!(req.parent_id.is_none());
        assert_eq!(req.order, 0);
        assert!(req.allowed_groups.is_empty());
    }

    #[test]
    fn test_node_response_omits_empty_optionals() {
        let node = MenuNode::new("Dashboard");
        let response: MenuNodeResponse = node.into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("parentId"));
        assert!(!json.contains("icon"));
        assert!(json.contains("allowedGroups"));
    }
}

//! Auth API Endpoints
//!
//! - POST /register - Self-service account registration
//! - POST /login - Password login with institution selection
//! - POST /refresh-token - Exchange a refresh token (with rotation)
//! - POST /logout - Revoke a refresh token
//! - GET /me - Current user info

use axum::{extract::State, Json};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::auth_service::AuthService;
use crate::auth::password_service::PasswordService;
use crate::auth::refresh_token::RefreshToken;
use crate::auth::refresh_token_repository::RefreshTokenRepository;
use crate::institution::repository::InstitutionRepository;
use crate::shared::api_common::SuccessResponse;
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;
use crate::user::entity::User;
use crate::user::repository::UserRepository;
use crate::user_group::repository::UserGroupRepository;

/// Registration request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Email address (login identifier)
    pub email: String,

    /// Given name
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// Password (validated against the platform policy)
    pub password: String,

    /// Institution to join
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email address
    pub email: String,

    /// Password
    pub password: String,

    /// Institution to log into (required for institution-scoped users)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
}

/// Issued token pair
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// JWT access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Opaque refresh token
    pub refresh_token: String,
    /// The authenticated user
    pub user: UserInfo,
}

/// Refresh token request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    /// The refresh token
    pub refresh_token: String,
}

/// User info embedded in auth responses
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            group_id: u.group_id.clone(),
            institution_id: u.institution_id.clone(),
        }
    }
}

/// Institution available at login
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginInstitution {
    pub id: String,
    pub name: String,
}

/// Institutions available at login
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginInstitutionsResponse {
    pub institutions: Vec<LoginInstitution>,
}

/// Current user info response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub group_id: String,
    pub group_name: String,
    pub scope: crate::user_group::entity::GroupScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    pub permissions: Vec<String>,
}

/// Auth service state
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: Arc<AuthService>,
    pub password_service: Arc<PasswordService>,
    pub user_repo: Arc<UserRepository>,
    pub group_repo: Arc<UserGroupRepository>,
    pub institution_repo: Arc<InstitutionRepository>,
    pub refresh_token_repo: Arc<RefreshTokenRepository>,
    /// Group assigned to self-registered accounts
    pub default_group_id: String,
}

/// A scoped member must name their own institution at login; no
/// membership or a mismatch both fail.
fn requested_institution_matches(user: &User, requested: Option<&str>) -> bool {
    match (user.institution_id.as_deref(), requested) {
        (Some(own), Some(requested)) => own == requested,
        _ => false,
    }
}

async fn issue_tokens(state: &AuthApiState, user: &User) -> Result<TokenResponse, PlatformError> {
    let access_token = state.auth_service.generate_access_token(user)?;

    let (raw_token, token_entity) = RefreshToken::generate_token_pair(&user.id);
    state.refresh_token_repo.insert(&token_entity).await?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth_service.access_token_expiry_secs(),
        refresh_token: raw_token,
        user: user.into(),
    })
}

/// Register a new account
///
/// Creates a user in the default group. Registration does not grant any
/// elevated permissions; group changes are an admin operation.
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    operation_id = "postAuthRegister",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AuthApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, PlatformError> {
    if req.email.split('@').count() != 2 {
        return Err(PlatformError::validation("Invalid email address"));
    }
    if req.first_name.trim().is_empty() {
        return Err(PlatformError::validation("First name must not be empty"));
    }

    // Institution must exist and be active
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

    // The default group is seeded; a missing one means seeding never ran
    if !state.group_repo.exists(&state.default_group_id).await? {
        return Err(PlatformError::internal("Default user group is not provisioned"));
    }

    let password_hash = state.password_service.hash_password(&req.password)?;

    let mut user = User::new(
        &req.email,
        req.first_name.trim(),
        req.last_name.trim(),
        password_hash,
        &state.default_group_id,
    );
    if let Some(institution_id) = req.institution_id {
        user = user.with_institution(institution_id);
    }

    // The unique email index decides, not a prior read
    if !state.user_repo.insert_if_absent(&user).await? {
        return Err(PlatformError::duplicate("User", "email", &user.email));
    }

    info!(user_id = %user.id, email = %user.email, "User registered");

    Ok(Json(issue_tokens(&state, &user).await?))
}

/// Login with email, password, and institution
///
/// Institution-scoped users must name their own institution; system-wide
/// users log in without one. All failure modes return the same
/// credential error so callers cannot tell which part was wrong.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    operation_id = "postAuthLogin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, PlatformError> {
    let user = state
        .user_repo
        .find_by_email(&req.email)
        .await?
        .ok_or(PlatformError::InvalidCredentials)?;

    if !state.password_service.verify_password(&req.password, &user.password_hash)? {
        return Err(PlatformError::InvalidCredentials);
    }

    if !user.active {
        return Err(PlatformError::InvalidCredentials);
    }

    let group = state
        .group_repo
        .find_by_id(&user.group_id)
        .await?
        .ok_or(PlatformError::InvalidCredentials)?;

    // Scoped members may only enter through their own institution,
    // and only while that institution is still active
    if !group.is_system_wide() {
        if !requested_institution_matches(&user, req.institution_id.as_deref()) {
            return Err(PlatformError::InvalidCredentials);
        }
        if let Some(own) = user.institution_id.as_deref() {
            if state.institution_repo.find_active_by_id(own).await?.is_none() {
                return Err(PlatformError::InvalidCredentials);
            }
        }
    }

    state.user_repo.record_login(&user.id).await?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(issue_tokens(&state, &user).await?))
}

/// Logout
///
/// Revokes the presented refresh token. The access token stays valid
/// until it expires; logout only closes the refresh path.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    operation_id = "postAuthLogout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logged out", body = SuccessResponse)
    )
)]
pub async fn logout(
    State(state): State<AuthApiState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    let token_hash = RefreshToken::hash_token(&req.refresh_token);

    // Unknown or already-revoked tokens are not an error; logout is idempotent
    state.refresh_token_repo.revoke_by_hash(&token_hash).await?;

    Ok(Json(SuccessResponse::with_message("Logged out")))
}

/// Refresh access token
///
/// Exchange a refresh token for a new access token. The refresh token is
/// rotated: the old one is revoked and a new one issued.
#[utoipa::path(
    post,
    path = "/refresh-token",
    tag = "auth",
    operation_id = "postAuthRefreshToken",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AuthApiState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, PlatformError> {
    let token_hash = RefreshToken::hash_token(&req.refresh_token);

    let stored_token = state
        .refresh_token_repo
        .find_valid_by_hash(&token_hash)
        .await?
        .ok_or_else(|| PlatformError::InvalidToken {
            message: "Invalid or expired refresh token".to_string(),
        })?;

    // Rotation: a refresh token is single-use
    state.refresh_token_repo.revoke_by_hash(&token_hash).await?;

    let user = state
        .user_repo
        .find_by_id(&stored_token.user_id)
        .await?
        .ok_or_else(|| PlatformError::InvalidToken {
            message: "User not found".to_string(),
        })?;

    if !user.active {
        return Err(PlatformError::unauthorized("Account is not active"));
    }

    Ok(Json(issue_tokens(&state, &user).await?))
}

/// List institutions available for login
///
/// Public: the login form needs the institution picker before any
/// credentials exist. Only id and name are exposed.
#[utoipa::path(
    get,
    path = "/institutions",
    tag = "auth",
    operation_id = "getAuthInstitutions",
    responses(
        (status = 200, description = "Active institutions", body = LoginInstitutionsResponse)
    )
)]
pub async fn list_login_institutions(
    State(state): State<AuthApiState>,
) -> Result<Json<LoginInstitutionsResponse>, PlatformError> {
    let mut institutions: Vec<LoginInstitution> = state
        .institution_repo
        .find_active()
        .await?
        .into_iter()
        .map(|i| LoginInstitution { id: i.id, name: i.name })
        .collect();
    institutions.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(LoginInstitutionsResponse { institutions }))
}

/// Get current user info
///
/// Returns the authenticated user together with the resolved group scope
/// and permission set.
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    operation_id = "getAuthMe",
    responses(
        (status = 200, description = "Current user info", body = CurrentUserResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    auth: Authenticated,
) -> Result<Json<CurrentUserResponse>, PlatformError> {
    let ctx = &auth.0;

    let mut permissions: Vec<String> = ctx.permissions.iter().cloned().collect();
    permissions.sort();

    Ok(Json(CurrentUserResponse {
        id: ctx.user_id.clone(),
        email: ctx.email.clone(),
        name: ctx.name.clone(),
        group_id: ctx.group_id.clone(),
        group_name: ctx.group_name.clone(),
        scope: ctx.scope,
        institution_id: ctx.institution_id.clone(),
        permissions,
    }))
}

/// Create the auth router
pub fn auth_router(state: AuthApiState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(login))
        .routes(routes!(refresh_token))
        .routes(routes!(logout))
        .routes(routes!(list_login_institutions))
        .routes(routes!(get_current_user))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{"email":"test@example.com","password":"secret","institutionId":"inst-1"}"#;
        let req: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.email, "test@example.com");
        assert_eq!(req.password, "secret");
        assert_eq!(req.institution_id.as_deref(), Some("inst-1"));
    }

    #[test]
    fn test_login_request_without_institution() {
        let json = r#"{"email":"ops@example.com","password":"secret"}"#;
        let req: LoginRequest = serde_json::from_str(json).unwrap();
        assert!(req.institution_id.is_none());
    }

    #[test]
    fn test_scoped_login_requires_matching_institution() {
        let member = User::new("a@b.com", "A", "B", "hash", "user").with_institution("inst-1");

        assert!(requested_institution_matches(&member, Some("inst-1")));
        assert!(!requested_institution_matches(&member, Some("inst-2")));
        assert!(!requested_institution_matches(&member, None));

        // No membership at all never matches
        let detached = User::new("b@b.com", "B", "C", "hash", "user");
        assert!(!requested_institution_matches(&detached, Some("inst-1")));
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse {
            access_token: "jwt".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
            refresh_token: "opaque".to_string(),
            user: UserInfo {
                id: "u1".to_string(),
                email: "test@example.com".to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                group_id: "user".to_string(),
                institution_id: None,
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("accessToken"));
        assert!(json.contains("refreshToken"));
        assert!(json.contains("\"expiresIn\":900"));
        assert!(!json.contains("institutionId"));
    }
}

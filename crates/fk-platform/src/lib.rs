//! FoundationKit Platform
//!
//! Core platform providing:
//! - Email/password authentication with JWT access tokens and rotating
//!   refresh tokens
//! - Role-based authorization through user groups with flat permission sets
//! - Multi-tenant institution scoping
//! - A role-filtered navigation menu tree
//! - Idempotent database provisioning and catalog-driven seeding
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - `api` - REST endpoints

// Core aggregates
pub mod institution;
pub mod menu;
pub mod user;
pub mod user_group;

// Authentication & authorization
pub mod auth;

// Shared infrastructure
pub mod shared;

// Provisioning & seeding
pub mod seed;
pub mod storage;

// Re-export common types from shared
pub use shared::error::{PlatformError, Result};

// Re-export main entity types for convenience
pub use institution::entity::Institution;
pub use menu::entity::{MenuNode, MenuTree, VisibleMenuItem};
pub use user::entity::User;
pub use user_group::entity::{operations, GroupScope, UserGroup};

// Re-export repositories
pub use institution::repository::InstitutionRepository;
pub use menu::repository::MenuRepository;
pub use user::repository::UserRepository;
pub use user_group::repository::UserGroupRepository;

// Re-export services
pub use auth::auth_service::{AccessTokenClaims, AuthConfig, AuthService};
pub use auth::password_service::PasswordService;
pub use auth::refresh_token::RefreshToken;
pub use auth::refresh_token_repository::RefreshTokenRepository;
pub use shared::authorization_service::{AuthContext, AuthorizationService};

// Re-export seeding
pub use seed::catalog::SeedCatalog;
pub use seed::seeder::{DataSeeder, MongoSeedStore, SeedReport, SeedState, SeedStore};

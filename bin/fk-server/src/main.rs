//! FoundationKit Server
//!
//! Production server for the platform REST APIs:
//! - Auth APIs: register, login, token refresh, current user
//! - Admin APIs: users, institutions, user groups, stats
//! - Menu API: role-filtered navigation tree
//! - Database APIs: provisioning and seeding
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FK_API_PORT` | `8080` | HTTP API port |
//! | `FK_HEALTH_PORT` | `9090` | Health probe port |
//! | `FK_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `FK_MONGO_DB` | `foundation-kit` | MongoDB database name |
//! | `FK_JWT_SECRET` | - | HMAC secret for access tokens (generated if unset) |
//! | `FK_JWT_ISSUER` | `foundation-kit` | JWT issuer claim |
//! | `FK_AUTO_SEED` | `false` | Provision and seed the database on startup |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use axum::{
    routing::get,
    response::Json,
    Router,
};
use utoipa_axum::router::OpenApiRouter;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use anyhow::Result;
use tracing::{info, warn};
use tokio::{signal, net::TcpListener};
use utoipa_swagger_ui::SwaggerUi;

use fk_platform::auth::api::{auth_router, AuthApiState};
use fk_platform::auth::auth_service::{AuthConfig, AuthService};
use fk_platform::auth::password_service::PasswordService;
use fk_platform::auth::refresh_token_repository::RefreshTokenRepository;
use fk_platform::institution::api::{institutions_router, InstitutionsState};
use fk_platform::institution::repository::InstitutionRepository;
use fk_platform::menu::api::{menu_router, MenuState};
use fk_platform::menu::repository::MenuRepository;
use fk_platform::seed::api::{database_router, SeedApiState};
use fk_platform::seed::catalog::SeedCatalog;
use fk_platform::seed::seeder::{DataSeeder, MongoSeedStore};
use fk_platform::shared::authorization_service::AuthorizationService;
use fk_platform::shared::middleware::{AppState, AuthLayer};
use fk_platform::shared::stats_api::{stats_router, StatsState};
use fk_platform::user::api::{users_router, UsersState};
use fk_platform::user::repository::UserRepository;
use fk_platform::user_group::api::{user_groups_router, UserGroupsState};
use fk_platform::user_group::repository::UserGroupRepository;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<()> {
    fk_common::logging::init_logging("fk-server");

    info!("Starting FoundationKit Server");

    // Configuration from environment
    let api_port: u16 = env_or_parse("FK_API_PORT", 8080);
    let health_port: u16 = env_or_parse("FK_HEALTH_PORT", 9090);
    let mongo_url = env_or("FK_MONGO_URL", "mongodb://localhost:27017");
    let mongo_db = env_or("FK_MONGO_DB", "foundation-kit");
    let jwt_issuer = env_or("FK_JWT_ISSUER", "foundation-kit");

    let jwt_secret = match std::env::var("FK_JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            // Tokens will not survive a restart without a configured secret
            warn!("FK_JWT_SECRET not set; generating an ephemeral secret");
            uuid::Uuid::new_v4().to_string()
        }
    };

    // Connect to MongoDB
    info!("Connecting to MongoDB: {}/{}", mongo_url, mongo_db);
    let mongo_client = mongodb::Client::with_uri_str(&mongo_url).await?;
    let db = mongo_client.database(&mongo_db);

    // Initialize repositories
    let user_repo = Arc::new(UserRepository::new(&db));
    let group_repo = Arc::new(UserGroupRepository::new(&db));
    let institution_repo = Arc::new(InstitutionRepository::new(&db));
    let menu_repo = Arc::new(MenuRepository::new(&db));
    let refresh_token_repo = Arc::new(RefreshTokenRepository::new(&db));
    info!("Repositories initialized");

    // Seeder with the default catalog
    let seeder = Arc::new(DataSeeder::new(
        MongoSeedStore::new(db.clone(), group_repo.clone(), menu_repo.clone()),
        SeedCatalog::default(),
    ));

    if env_flag("FK_AUTO_SEED") {
        match seeder.seed_all().await {
            Ok(report) => info!(state = report.state.as_str(), "Auto-seed complete"),
            Err(e) => warn!("Auto-seed failed: {}", e),
        }
    }

    // Initialize auth services
    let auth_config = AuthConfig {
        secret_key: jwt_secret,
        issuer: jwt_issuer,
        ..AuthConfig::default()
    };
    let auth_service = Arc::new(AuthService::new(auth_config));
    let authz_service = Arc::new(AuthorizationService::new(
        user_repo.clone(),
        group_repo.clone(),
        institution_repo.clone(),
    ));
    let password_service = Arc::new(PasswordService::default());
    info!("Auth services initialized");

    let app_state = AppState {
        auth_service: auth_service.clone(),
        authz_service,
    };

    // Build API states
    let auth_state = AuthApiState {
        auth_service,
        password_service: password_service.clone(),
        user_repo: user_repo.clone(),
        group_repo: group_repo.clone(),
        institution_repo: institution_repo.clone(),
        refresh_token_repo: refresh_token_repo.clone(),
        default_group_id: SeedCatalog::default_registration_group().to_string(),
    };
    let users_state = UsersState {
        user_repo: user_repo.clone(),
        group_repo: group_repo.clone(),
        institution_repo: institution_repo.clone(),
        password_service,
        refresh_token_repo,
    };
    let institutions_state = InstitutionsState {
        institution_repo: institution_repo.clone(),
        user_repo: user_repo.clone(),
    };
    let user_groups_state = UserGroupsState {
        group_repo: group_repo.clone(),
        user_repo: user_repo.clone(),
    };
    let menu_state = MenuState {
        menu_repo: menu_repo.clone(),
    };
    let stats_state = StatsState {
        user_repo,
        group_repo,
        institution_repo,
        menu_repo,
    };
    let seed_api_state = SeedApiState { seeder };

    // Build the API router with auto-collected OpenAPI paths
    let (router, mut openapi) = OpenApiRouter::new()
        .nest("/auth", auth_router(auth_state))
        .nest("/api/admin/users", users_router(users_state))
        .nest("/api/admin/institutions", institutions_router(institutions_state))
        .nest("/api/admin/user-groups", user_groups_router(user_groups_state))
        .nest("/api/admin/stats", stats_router(stats_state))
        .nest("/api/menu", menu_router(menu_state))
        .nest("/api/database", database_router(seed_api_state))
        .split_for_parts();

    openapi.info.title = "FoundationKit API".to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.description =
        Some("REST APIs for auth, tenants, navigation, and administration".to_string());

    let app = Router::new()
        .merge(router)
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", openapi))
        .layer(AuthLayer::new(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    // Start API server
    let api_addr = format!("0.0.0.0:{}", api_port);
    info!("API server listening on http://{}", api_addr);

    let api_listener = TcpListener::bind(&api_addr).await?;
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(api_listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    // Start health server
    let health_addr = format!("0.0.0.0:{}", health_port);
    info!("Health server listening on http://{}/health", health_addr);

    let health_app = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    let health_listener = TcpListener::bind(&health_addr).await?;
    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_app).await {
            tracing::error!("Health server error: {}", e);
        }
    });

    info!("FoundationKit Server started");
    info!("Press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received...");

    api_task.abort();
    health_task.abort();

    info!("FoundationKit Server shutdown complete");
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "READY"
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use atlascrm_api::{app::{build_router, AppState}, config::Config};
/// use atlascrm_shared::auth::reset::LogResetTokenSender;
/// use atlascrm_shared::auth::service::AuthService;
/// use atlascrm_shared::clock::SystemClock;
/// use atlascrm_shared::db::pool::create_pool;
/// use atlascrm_shared::store::PgStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.pool_config()).await?;
/// let auth = AuthService::new(
///     Arc::new(PgStore::new(pool)),
///     Arc::new(SystemClock),
///     Arc::new(LogResetTokenSender::new(config.api.production)),
///     config.auth_config(),
/// )?;
///
/// let app = build_router(AppState::new(auth, config));
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use atlascrm_shared::auth::service::AuthService;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Credential and entitlement services
    pub auth: Arc<AuthService>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(auth: AuthService, config: Config) -> Self {
        Self {
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/                     # Session endpoints (Cache-Control: no-store)
///     │   ├── POST /login
///     │   ├── POST /register
///     │   ├── POST /logout
///     │   ├── POST /forgot-password
///     │   ├── POST /reset-password
///     │   └── POST /redeem-code
///     ├── POST /demo-requests        # Public demo form
///     ├── GET  /me                   # Session required
///     └── /admin/                    # Admin tier required
///         ├── POST /activation-codes
///         └── GET  /scope
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
///
/// Authentication is per handler through the `CurrentAccess` and
/// `AdminAccess` extractors.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/register", post(routes::auth::register))
        .route("/logout", post(routes::auth::logout))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password", post(routes::auth::reset_password))
        .route("/redeem-code", post(routes::auth::redeem_code))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let admin_routes = Router::new()
        .route(
            "/activation-codes",
            post(routes::activation::issue_paid_code),
        )
        .route("/scope", get(routes::access::scope));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .route("/demo-requests", post(routes::activation::request_demo))
        .route("/me", get(routes::access::me));

    // Configure CORS based on environment
    let cors = if state.config.allows_any_origin() {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

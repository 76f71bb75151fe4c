pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::{ApiError, create_api_router};
use auth::AuthService;
use axum::Router;
use db::Database;
use jwt::{DEFAULT_ACCESS_TOKEN_SECS, DEFAULT_REFRESH_TOKEN_SECS, TokenService};
use password::PasswordHasher;
use rate_limit::{DEFAULT_AUTH_ATTEMPTS_PER_MINUTE, RateLimitConfig};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password_hasher: PasswordHasher,
    /// Attempts per minute per client on login/register/refresh, `None` disables
    pub auth_rate_limit: Option<NonZeroU32>,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_extractor: Option<cli::IpExtractor>,
}

impl ServerConfig {
    /// Config with the default lifetimes, hasher and rate limit.
    pub fn new(db: Database, jwt_secret: Vec<u8>) -> Self {
        Self {
            db,
            jwt_secret,
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TOKEN_SECS),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TOKEN_SECS),
            password_hasher: PasswordHasher::default(),
            auth_rate_limit: NonZeroU32::new(DEFAULT_AUTH_ATTEMPTS_PER_MINUTE),
            ip_extractor: None,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        let tokens = Arc::new(TokenService::with_lifetimes(
            &self.jwt_secret,
            self.access_token_ttl,
            self.refresh_token_ttl,
        ));
        AuthService::new(self.db.clone(), tokens, self.password_hasher.clone())
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let rate_limit_config = config
        .auth_rate_limit
        .map(|attempts| Arc::new(RateLimitConfig::per_minute(attempts, config.ip_extractor)));

    let api_router = create_api_router(config.db.clone(), config.auth_service(), rate_limit_config);

    Router::new()
        .nest("/api", api_router)
        .fallback(|| async { ApiError::not_found("Resource not found") })
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}

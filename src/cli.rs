//! CLI argument parsing, validation, and startup helpers.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::ServerConfig;
use crate::auth::{AuthError, AuthService};
use crate::db::{ADMIN_ROLE, Database, USER_ROLE};
use crate::jwt::{DEFAULT_ACCESS_TOKEN_SECS, DEFAULT_REFRESH_TOKEN_SECS};
use crate::password::PasswordHasher;
use crate::rate_limit::DEFAULT_AUTH_ATTEMPTS_PER_MINUTE;
use clap::Parser;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ADMIN_PASSWORD_LENGTH: usize = 6;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header set by a trusted reverse proxy that carries the client address.
/// Only configure this when every request passes through that proxy, since
/// clients can send these headers themselves.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpExtractor {
    /// `X-Forwarded-For`, using the last hop (the one the proxy appended)
    XForwardedFor,
    /// `X-Real-IP` (nginx)
    XRealIp,
    /// `CF-Connecting-IP` (Cloudflare)
    CfConnectingIp,
}

impl IpExtractor {
    pub fn header_name(self) -> &'static str {
        match self {
            Self::XForwardedFor => "x-forwarded-for",
            Self::XRealIp => "x-real-ip",
            Self::CfConnectingIp => "cf-connecting-ip",
        }
    }

    /// Pull the client address out of the header value.
    pub fn extract(self, value: &str) -> Result<String, &'static str> {
        let candidate = match self {
            Self::XForwardedFor => value.rsplit(',').next().unwrap_or_default(),
            Self::XRealIp | Self::CfConnectingIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Quillpost",
    about = "Blog backend with articles, threaded comments and bearer-token auth"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, default_value = "quillpost.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_TOKEN_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_TOKEN_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_token_ttl: u64,

    /// Login/register/refresh attempts per minute per client (0 disables the limit)
    #[arg(long, default_value_t = DEFAULT_AUTH_ATTEMPTS_PER_MINUTE)]
    pub auth_rate_limit: u32,

    /// Read the client address from this proxy header instead of the socket
    /// (only behind a trusted reverse proxy)
    #[arg(long, value_enum)]
    pub ip_header: Option<IpExtractor>,

    /// Create an admin account with this username on startup if it does not exist
    #[arg(long, requires = "admin_email")]
    pub create_admin: Option<String>,

    /// Email for the account created by --create-admin
    #[arg(long)]
    pub admin_email: Option<String>,

    /// Password for the account created by --create-admin
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true, hide = true)]
    pub admin_password: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
/// The secret itself is never logged.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    info!("JWT secret loaded");
    Some(secret)
}

/// Handle the --create-admin flag: create the admin account unless the
/// username is already taken. Returns false if startup should abort.
pub async fn handle_create_admin(
    auth: &AuthService,
    username: &str,
    email: &str,
    password: Option<&str>,
) -> bool {
    let Some(password) = password.filter(|p| p.len() >= MIN_ADMIN_PASSWORD_LENGTH) else {
        error!(
            "ADMIN_PASSWORD must be set to at least {} characters when using --create-admin",
            MIN_ADMIN_PASSWORD_LENGTH
        );
        return false;
    };

    match auth
        .create_account(username, email, password, &[USER_ROLE, ADMIN_ROLE])
        .await
    {
        Ok(user) => {
            info!(username = %user.username, user_id = user.id, "Admin user created");
            true
        }
        Err(AuthError::DuplicateUsername) => {
            info!(username = %username, "Admin user already exists");
            true
        }
        Err(e) => {
            error!(username = %username, error = %e, "Failed to create admin user");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl: Duration::from_secs(args.access_token_ttl),
        refresh_token_ttl: Duration::from_secs(args.refresh_token_ttl),
        password_hasher: PasswordHasher::default(),
        auth_rate_limit: NonZeroU32::new(args.auth_rate_limit),
        ip_extractor: args.ip_header,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

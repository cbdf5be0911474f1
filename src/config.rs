//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and kept in memory. Several settings
//! accept more than one variable name so existing `.env` files keep working.

use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 5500;
const DEFAULT_ACCESS_TTL: &str = "15m";
const DEFAULT_REFRESH_TTL: &str = "7d";

/// Deployment environment, derived from `NODE_ENV`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Deadlines applied to external calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Acquiring a database connection
    pub connect: Duration,
    /// A single credential store query
    pub query: Duration,
    /// A bcrypt hash or compare
    pub password_hash: Duration,
    /// End-to-end budget for a password login (tolerates cold starts)
    pub login: Duration,
    /// Calls to Google's identity endpoints
    pub upstream: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            query: Duration::from_secs(8),
            password_hash: Duration::from_secs(4),
            login: Duration::from_secs(45),
            upstream: Duration::from_secs(5),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Server port
    pub port: u16,
    pub environment: Environment,
    /// Frontend URL (always allowed by CORS)
    pub frontend_url: String,
    /// Extra allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Prefix every route is mounted under (e.g. `/api`), empty for none
    pub api_base_path: String,
    /// Google OAuth client id; empty disables Google sign-in
    pub google_client_id: String,
    /// PostgreSQL URL; `None` selects the in-memory store
    pub database_url: Option<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub timeouts: Timeouts,

    // --- Secrets ---
    /// HMAC key for access tokens (raw bytes)
    pub jwt_access_secret: Vec<u8>,
    /// HMAC key for refresh tokens; must differ from the access key
    pub jwt_refresh_secret: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // First non-empty value among `names`.
        let var = |names: &[&'static str]| -> Option<String> {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        let required = |names: &[&'static str]| -> Result<String, ConfigError> {
            var(names).ok_or(ConfigError::Missing(names[0]))
        };
        let millis = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match var(&[name]) {
                None => Ok(default),
                Some(raw) => match raw.parse::<u64>() {
                    Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
                    _ => Err(ConfigError::InvalidValue { name, value: raw }),
                },
            }
        };

        let environment = match var(&["NODE_ENV"]).as_deref() {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        };

        let port = match var(&["PORT"]) {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: raw,
            })?,
        };

        let access_ttl_raw =
            var(&["JWT_EXPIRES", "JWT_ACCESS_EXPIRES"]).unwrap_or_else(|| DEFAULT_ACCESS_TTL.into());
        let refresh_ttl_raw = var(&["REFRESH_EXPIRES", "JWT_REFRESH_EXPIRES"])
            .unwrap_or_else(|| DEFAULT_REFRESH_TTL.into());

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            connect: millis("DB_CONNECT_TIMEOUT_MS", defaults.connect)?,
            query: millis("DB_QUERY_TIMEOUT_MS", defaults.query)?,
            password_hash: millis("PASSWORD_HASH_TIMEOUT_MS", defaults.password_hash)?,
            login: millis("LOGIN_TIMEOUT_MS", defaults.login)?,
            upstream: millis("GOOGLE_HTTP_TIMEOUT_MS", defaults.upstream)?,
        };

        let config = Self {
            port,
            environment,
            frontend_url: var(&["FRONTEND_URL"])
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            cors_origins: var(&["CORS_ORIGIN"])
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().trim_end_matches('/').to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            api_base_path: normalize_base_path(&var(&["API_BASE_PATH"]).unwrap_or_default()),
            google_client_id: var(&["GOOGLE_CLIENT_ID"]).unwrap_or_default(),
            database_url: var(&["DATABASE_URL"]),
            access_token_ttl: parse_duration(&access_ttl_raw)?,
            refresh_token_ttl: parse_duration(&refresh_ttl_raw)?,
            timeouts,
            jwt_access_secret: required(&["JWT_SECRET", "JWT_ACCESS_SECRET"])?.into_bytes(),
            jwt_refresh_secret: required(&["REFRESH_SECRET", "JWT_REFRESH_SECRET"])?.into_bytes(),
        };

        if config.jwt_access_secret == config.jwt_refresh_secret {
            return Err(ConfigError::SharedSecret);
        }

        Ok(config)
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            port: 0,
            environment: Environment::Development,
            frontend_url: "http://localhost:5173".to_string(),
            cors_origins: Vec::new(),
            api_base_path: String::new(),
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            database_url: None,
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            timeouts: Timeouts::default(),
            jwt_access_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            jwt_refresh_secret: b"test_refresh_secret_32_bytes_mn!".to_vec(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Path the refresh cookie is scoped to.
    pub fn refresh_path(&self) -> String {
        format!("{}/auth/refresh", self.api_base_path)
    }
}

/// `"api/"` -> `"/api"`, `"/"` -> `""`.
fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Parse a lifetime such as `15m`, `7d`, `12h`, `30s` or bare seconds (`900`).
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(raw.to_string());
    let s = raw.trim();

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    match amount.checked_mul(multiplier) {
        Some(secs) if (1..=MAX_TOKEN_TTL.as_secs()).contains(&secs) => {
            Ok(Duration::from_secs(secs))
        }
        _ => Err(invalid()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid duration: {0:?} (expected e.g. 15m, 7d, 3600)")]
    InvalidDuration(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Access and refresh token secrets must be different")]
    SharedSecret,
}

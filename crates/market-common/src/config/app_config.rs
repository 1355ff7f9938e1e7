//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub snowflake: SnowflakeConfig,
    pub moderation: ModerationConfig,
    pub review: ReviewConfig,
    pub matching: MatchingConfig,
    pub payments: PaymentsConfig,
    pub notifications: NotificationConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// JWT verification settings. Tokens are issued by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Snowflake ID generator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeConfig {
    #[serde(default)]
    pub worker_id: u16,
}

/// Anti-spam gate settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Upper bound on the rules evaluator call; exceeding it rejects
    #[serde(default = "default_gate_timeout_ms")]
    pub gate_timeout_ms: u64,
    #[serde(default = "default_velocity_window_secs")]
    pub velocity_window_secs: u64,
    /// Submissions per phone per window before a request is flagged
    #[serde(default = "default_phone_soft_limit")]
    pub phone_soft_limit: u32,
    /// Submissions per phone per window before a request is rejected
    #[serde(default = "default_phone_hard_limit")]
    pub phone_hard_limit: u32,
    #[serde(default = "default_user_soft_limit")]
    pub user_soft_limit: u32,
    #[serde(default = "default_user_hard_limit")]
    pub user_hard_limit: u32,
    /// How long a content fingerprint counts as a duplicate
    #[serde(default = "default_duplicate_ttl_secs")]
    pub duplicate_ttl_secs: u64,
    #[serde(default)]
    pub blocked_phones: Vec<String>,
    #[serde(default)]
    pub trusted_users: Vec<i64>,
    #[serde(default)]
    pub admins: Vec<i64>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            gate_timeout_ms: default_gate_timeout_ms(),
            velocity_window_secs: default_velocity_window_secs(),
            phone_soft_limit: default_phone_soft_limit(),
            phone_hard_limit: default_phone_hard_limit(),
            user_soft_limit: default_user_soft_limit(),
            user_hard_limit: default_user_hard_limit(),
            duplicate_ttl_secs: default_duplicate_ttl_secs(),
            blocked_phones: Vec::new(),
            trusted_users: Vec::new(),
            admins: Vec::new(),
        }
    }
}

/// AI review queue settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    pub reviewer_url: String,
    #[serde(default = "default_review_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_review_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_review_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            reviewer_url: String::new(),
            max_attempts: default_review_max_attempts(),
            base_delay_ms: default_review_base_delay_ms(),
            max_delay_ms: default_review_max_delay_ms(),
            request_timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Matching engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_request_ttl_hours")]
    pub request_ttl_hours: i64,
    #[serde(default = "default_offer_ttl_hours")]
    pub offer_ttl_hours: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            request_ttl_hours: default_request_ttl_hours(),
            offer_ttl_hours: default_offer_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Payment verifier settings
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub verifier_url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Notification dispatcher settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_notification_retry_ms")]
    pub retry_delay_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_notification_attempts(),
            retry_delay_ms: default_notification_retry_ms(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "parts-market".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_jwt_leeway() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_burst() -> u32 {
    50
}

fn default_gate_timeout_ms() -> u64 {
    1500
}

fn default_velocity_window_secs() -> u64 {
    3600
}

fn default_phone_soft_limit() -> u32 {
    3
}

fn default_phone_hard_limit() -> u32 {
    10
}

fn default_user_soft_limit() -> u32 {
    5
}

fn default_user_hard_limit() -> u32 {
    20
}

fn default_duplicate_ttl_secs() -> u64 {
    86400 // 24 hours
}

fn default_review_max_attempts() -> u32 {
    5
}

fn default_review_base_delay_ms() -> u64 {
    500
}

fn default_review_max_delay_ms() -> u64 {
    30_000
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_request_ttl_hours() -> i64 {
    72
}

fn default_offer_ttl_hours() -> i64 {
    48
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_notification_attempts() -> u32 {
    3
}

fn default_notification_retry_ms() -> u64 {
    200
}

/// Parsed env var, or the default when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: impl FnOnce() -> T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(default)
}

fn env_required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key))
}

/// Comma separated list; empty entries are skipped
fn env_list<T: FromStr>(key: &'static str) -> Result<Vec<T>, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ConfigError::InvalidValue(key, s.to_string()))
        })
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            api: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| default_host()),
                port: env::var("API_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("API_PORT"))?,
                request_timeout_secs: env_or("API_REQUEST_TIMEOUT_SECS", default_request_timeout_secs),
            },
            database: DatabaseConfig {
                url: env_required("DATABASE_URL")?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", default_max_connections),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", default_min_connections),
            },
            redis: RedisConfig {
                url: env_required("REDIS_URL")?,
                max_connections: env_or("REDIS_MAX_CONNECTIONS", default_redis_max_connections),
            },
            jwt: JwtConfig {
                secret: env_required("JWT_SECRET")?,
                issuer: env::var("JWT_ISSUER").ok(),
                leeway_secs: env_or("JWT_LEEWAY_SECS", default_jwt_leeway),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: env_or("RATE_LIMIT_REQUESTS_PER_SECOND", default_requests_per_second),
                burst: env_or("RATE_LIMIT_BURST", default_burst),
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS")?,
            },
            snowflake: SnowflakeConfig {
                worker_id: env_or("WORKER_ID", || 0),
            },
            moderation: ModerationConfig {
                gate_timeout_ms: env_or("MODERATION_GATE_TIMEOUT_MS", default_gate_timeout_ms),
                velocity_window_secs: env_or("MODERATION_VELOCITY_WINDOW_SECS", default_velocity_window_secs),
                phone_soft_limit: env_or("MODERATION_PHONE_SOFT_LIMIT", default_phone_soft_limit),
                phone_hard_limit: env_or("MODERATION_PHONE_HARD_LIMIT", default_phone_hard_limit),
                user_soft_limit: env_or("MODERATION_USER_SOFT_LIMIT", default_user_soft_limit),
                user_hard_limit: env_or("MODERATION_USER_HARD_LIMIT", default_user_hard_limit),
                duplicate_ttl_secs: env_or("MODERATION_DUPLICATE_TTL_SECS", default_duplicate_ttl_secs),
                blocked_phones: env_list("MODERATION_BLOCKED_PHONES")?,
                trusted_users: env_list("MODERATION_TRUSTED_USERS")?,
                admins: env_list("MODERATION_ADMINS")?,
            },
            review: ReviewConfig {
                reviewer_url: env_required("AI_REVIEWER_URL")?,
                max_attempts: env_or("REVIEW_MAX_ATTEMPTS", default_review_max_attempts),
                base_delay_ms: env_or("REVIEW_BASE_DELAY_MS", default_review_base_delay_ms),
                max_delay_ms: env_or("REVIEW_MAX_DELAY_MS", default_review_max_delay_ms),
                request_timeout_ms: env_or("REVIEW_REQUEST_TIMEOUT_MS", default_http_timeout_ms),
            },
            matching: MatchingConfig {
                request_ttl_hours: env_or("MATCHING_REQUEST_TTL_HOURS", default_request_ttl_hours),
                offer_ttl_hours: env_or("MATCHING_OFFER_TTL_HOURS", default_offer_ttl_hours),
                sweep_interval_secs: env_or("MATCHING_SWEEP_INTERVAL_SECS", default_sweep_interval_secs),
            },
            payments: PaymentsConfig {
                verifier_url: env_required("PAYMENT_VERIFIER_URL")?,
                request_timeout_ms: env_or("PAYMENT_REQUEST_TIMEOUT_MS", default_http_timeout_ms),
            },
            notifications: NotificationConfig {
                max_attempts: env_or("NOTIFICATION_MAX_ATTEMPTS", default_notification_attempts),
                retry_delay_ms: env_or("NOTIFICATION_RETRY_DELAY_MS", default_notification_retry_ms),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PRODUCTION"), Some(Environment::Production));
        assert_eq!(Environment::parse("staging"), Some(Environment::Staging));
        assert_eq!(Environment::parse("qa"), None);
        assert!(Environment::Production.is_production());
        assert!(Environment::Development.is_development());
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        };
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_section_defaults() {
        let moderation = ModerationConfig::default();
        assert_eq!(moderation.gate_timeout_ms, 1500);
        assert!(moderation.phone_soft_limit < moderation.phone_hard_limit);
        assert!(moderation.user_soft_limit < moderation.user_hard_limit);

        let review = ReviewConfig::default();
        assert_eq!(review.max_attempts, 5);
        assert!(review.base_delay_ms <= review.max_delay_ms);

        assert_eq!(MatchingConfig::default().request_ttl_hours, 72);
        assert_eq!(NotificationConfig::default().max_attempts, 3);
    }

    #[test]
    fn test_env_list_parsing() {
        // Unique key so parallel tests do not race on the environment
        let key = "MARKET_COMMON_TEST_ADMIN_LIST";
        env::set_var(key, "1, 2,,3");
        let admins: Vec<i64> = env_list(key).unwrap();
        assert_eq!(admins, vec![1, 2, 3]);

        env::set_var(key, "1,x");
        assert!(matches!(
            env_list::<i64>(key),
            Err(ConfigError::InvalidValue(_, v)) if v == "x"
        ));
        env::remove_var(key);
        assert!(env_list::<i64>(key).unwrap().is_empty());
    }
}

//! # market-common
//!
//! Shared utilities including configuration, error handling, token
//! verification, telemetry, and the moderation policy object.

pub mod auth;
pub mod config;
pub mod error;
pub mod policy;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Claims, JwtVerifier};
pub use config::{
    AppConfig, AppSettings, ConfigError, CorsConfig, DatabaseConfig, Environment, JwtConfig,
    MatchingConfig, ModerationConfig, NotificationConfig, PaymentsConfig, RateLimitConfig,
    RedisConfig, ReviewConfig, ServerConfig, SnowflakeConfig,
};
pub use error::{domain_status, AppError, AppResult, ErrorResponse};
pub use policy::ModerationPolicy;
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};

//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, CorsConfig, DatabaseConfig, Environment, JwtConfig,
    MatchingConfig, ModerationConfig, NotificationConfig, PaymentsConfig, RateLimitConfig,
    RedisConfig, ReviewConfig, ServerConfig, SnowflakeConfig,
};

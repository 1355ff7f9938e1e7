//! Database connection pool management and schema setup

mod postgres;

pub use postgres::{create_pool, run_migrations, DatabaseConfig, MIGRATIONS};

// Re-export PgPool for convenience
pub use sqlx::postgres::PgPool;

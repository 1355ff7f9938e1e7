//! # market-db
//!
//! Storage layer for the parts marketplace.
//!
//! ## Overview
//!
//! - Connection pool management and schema setup
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - PostgreSQL repository implementations
//! - A row-level change feed over `LISTEN/NOTIFY`
//! - [`MemoryStore`], an in-process backend implementing the same traits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use market_db::pool::{create_pool, run_migrations, DatabaseConfig};
//! use market_db::repositories::PgRequestRepository;
//! use market_core::RequestRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::default()).await?;
//!     run_migrations(&pool).await?;
//!     let requests = PgRequestRepository::new(pool);
//!     // Use the repository...
//!     Ok(())
//! }
//! ```

pub mod change_feed;
pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;

pub use change_feed::{PgChangeFeed, CHANGE_CHANNEL};
pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{
    PgChatRepository, PgMessageRepository, PgOfferRepository, PgPaymentRepository,
    PgRatingRepository, PgRequestRepository,
};

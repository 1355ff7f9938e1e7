//! Application state
//!
//! Holds the shared state for the Axum application: the service context,
//! the token verifier, and handles for the readiness probe.

use std::sync::Arc;

use market_cache::RedisPool;
use market_common::JwtVerifier;
use market_db::PgPool;
use market_service::ServiceContext;

/// Backing services the readiness probe pings. `None` means the app runs
/// without that backend (in-process store, no Redis).
#[derive(Clone, Default)]
pub struct Probes {
    pub database: Option<PgPool>,
    pub redis: Option<RedisPool>,
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    service_context: Arc<ServiceContext>,
    jwt_verifier: Arc<JwtVerifier>,
    probes: Probes,
}

impl AppState {
    pub fn new(service_context: ServiceContext, jwt_verifier: JwtVerifier, probes: Probes) -> Self {
        Self {
            service_context: Arc::new(service_context),
            jwt_verifier: Arc::new(jwt_verifier),
            probes,
        }
    }

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Shared handle for background tasks
    pub fn shared_context(&self) -> Arc<ServiceContext> {
        self.service_context.clone()
    }

    pub fn jwt_verifier(&self) -> &JwtVerifier {
        &self.jwt_verifier
    }

    pub fn probes(&self) -> &Probes {
        &self.probes
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service_context", &self.service_context)
            .field("database", &self.probes.database.is_some())
            .field("redis", &self.probes.redis.is_some())
            .finish()
    }
}

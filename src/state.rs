use std::sync::Arc;

use crate::auth::{AuthError, TokenService};
use crate::config::AppConfig;
use crate::database::Store;
use crate::handlers::public::health::HealthCache;
use crate::middleware::rate_limit::RateLimiter;
use crate::registry::ModelRegistry;

/// Shared application context handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<ModelRegistry>,
    pub tokens: Arc<TokenService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub health: Arc<HealthCache>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, registry: Arc<ModelRegistry>) -> Result<Self, AuthError> {
        let tokens = TokenService::new(&config.security)?;
        let rate_limiter = RateLimiter::new(config.api.rate_limit_requests, config.api.rate_limit_window_secs);

        Ok(Self {
            config: Arc::new(config),
            store,
            registry,
            tokens: Arc::new(tokens),
            rate_limiter: Arc::new(rate_limiter),
            health: Arc::new(HealthCache::default()),
        })
    }
}

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::RateLimitConfig;
use crate::gateway::PaymentGateway;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub gateway: Arc<dyn PaymentGateway>,
    /// Lower-case ISO 4217 code every pledge is taken in.
    pub currency: String,
    /// Handed to clients so they can complete payment with the gateway.
    pub publishable_key: String,
    pub rate_limit: Option<RateLimitConfig>,
}

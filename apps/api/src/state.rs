use std::sync::Arc;

use sqlx::PgPool;

use crate::billing::stripe::StripeClient;
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Blob storage behind a trait object so tests can substitute a fake.
    pub store: Arc<dyn ObjectStore>,
    pub openai: OpenAiClient,
    pub stripe: StripeClient,
    pub config: Config,
}

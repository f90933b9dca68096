//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::rag::core::config::RagConfig;
use crate::rag::core::errors::RagResult;
use crate::rag::engine::core::RagEngine;

/// Shared application state.
pub struct AppState {
    /// Retrieval engine serving every request.
    pub engine: RagEngine,
}

impl AppState {
    /// Create the state from a configuration.
    ///
    /// # Errors
    /// Returns an error if the engine cannot be initialized.
    pub async fn new(config: RagConfig) -> RagResult<Arc<Self>> {
        let engine = RagEngine::from_config(config).await?;
        Ok(Arc::new(Self { engine }))
    }

    /// Wrap an existing engine.
    #[must_use]
    pub fn with_engine(engine: RagEngine) -> Arc<Self> {
        Arc::new(Self { engine })
    }
}

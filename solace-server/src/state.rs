//! Process-wide handles shared by every request: the document store, the
//! text generator and the loaded config. Built once in `main` and injected
//! everywhere else, so tests can substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;
use solace_core::generation::{GeminiConfig, GeminiGenerationClient, GenerationError, TextGenerator};
use solace_core::store::{DocumentStore, MemoryStore, PgDocumentStore};
use solace_core::SolaceConfig;

use crate::subsystems::goals::GoalTracker;
use crate::subsystems::summarizer::Summarizer;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub config: SolaceConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn TextGenerator>,
        config: SolaceConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(self.generator.clone(), self.config.generation.timeout_seconds)
    }

    pub fn goal_tracker(&self) -> GoalTracker {
        GoalTracker::new(
            self.store.clone(),
            self.generator.clone(),
            &self.config.analytics,
            self.config.generation.timeout_seconds,
        )
    }
}

/// Open the store selected by `[store] backend`.
pub async fn build_store(config: &SolaceConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store.backend.as_str() {
        "postgres" => {
            let pool = solace_core::db::create_pool(&config.store).await?;
            solace_core::db::ensure_schema(&pool).await?;
            tracing::info!(max_connections = config.store.max_connections, "Using Postgres document store");
            Ok(Arc::new(PgDocumentStore::new(pool)))
        }
        "memory" => {
            tracing::warn!("Using in-memory document store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => Err(anyhow::anyhow!("Unknown store backend: {}", other)),
    }
}

/// Create the Gemini client, or a generator that always fails when no API
/// key is configured so every call site takes its fallback path.
pub fn build_generator(config: &SolaceConfig) -> Arc<dyn TextGenerator> {
    match GeminiGenerationClient::new(GeminiConfig::from_settings(&config.generation)) {
        Ok(client) => {
            tracing::info!(model = %config.generation.model, "Gemini generation client ready");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Text generation unavailable; summaries and questions will use fallbacks");
            Arc::new(UnavailableGenerator)
        }
    }
}

/// Generator used when no provider could be configured.
pub struct UnavailableGenerator;

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

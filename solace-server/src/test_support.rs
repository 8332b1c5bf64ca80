//! Fakes shared by unit and integration tests. Integration tests reach this
//! module through the `test-support` feature.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solace_core::generation::{GenerationError, TextGenerator};
use solace_core::models::Message;
use solace_core::{MemoryStore, SolaceConfig};

use crate::state::AppState;

/// Replies with the first scripted response whose needle appears in the
/// prompt, else the default. Records every prompt it receives.
pub struct ScriptedGenerator {
    default: String,
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(default: &str) -> Self {
        Self {
            default: default.to_string(),
            rules: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default.clone());
        Ok(reply)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Api {
            code: 429,
            message: "Quota exceeded".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Goal extraction prompts ask for a JSON array; everything else gets `summary`.
pub fn therapist(summary: &str, goals_json: &str) -> ScriptedGenerator {
    ScriptedGenerator::new(summary).on("JSON array", goals_json)
}

pub fn memory_state(generator: Arc<dyn TextGenerator>) -> Arc<AppState> {
    memory_state_with(generator, SolaceConfig::for_memory_store())
}

pub fn memory_state_with(generator: Arc<dyn TextGenerator>, config: SolaceConfig) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(MemoryStore::new()), generator, config))
}

pub fn user_messages(owner: &str, texts: &[&str]) -> Vec<Message> {
    texts.iter().map(|t| Message::user(*t, owner)).collect()
}

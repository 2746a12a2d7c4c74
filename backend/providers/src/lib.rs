pub mod gemini;
pub mod mock;
pub mod openai_compat;

use std::collections::HashMap;
use std::sync::Arc;

use cropdoc_core::GenerationClient;

pub use gemini::GeminiClient;
pub use mock::MockGenerationClient;
pub use openai_compat::OpenAiCompatClient;

/// Registry of generation clients, looked up by name.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn GenerationClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a client under its own name.
    pub fn register(&mut self, provider: Arc<dyn GenerationClient>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationClient>> {
        self.providers.get(name).cloned()
    }

    /// Get all registered provider names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

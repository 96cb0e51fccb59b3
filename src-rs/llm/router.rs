use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::types::{CompletionRequest, LLMResponse, ProviderAdapter, ProviderError, TokenStream};

#[derive(Clone, Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: String,
    #[serde(skip)]
    pub provider: String,
}

pub struct LLMRouter {
    default_provider: String,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    models: Vec<ModelInfo>,
}

impl LLMRouter {
    pub fn new(default_provider: &str) -> Self {
        Self {
            default_provider: default_provider.to_string(),
            providers: HashMap::new(),
            models: Vec::new(),
        }
    }

    pub fn register_provider(&mut self, name: &str, owned_by: &str, adapter: Arc<dyn ProviderAdapter>) {
        for id in adapter.models() {
            self.models.push(ModelInfo {
                id,
                owned_by: owned_by.to_string(),
                provider: name.to_string(),
            });
        }
        self.providers.insert(name.to_string(), adapter);
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn provider_for_model(&self, model: &str) -> Option<String> {
        self.models
            .iter()
            .find(|info| info.id == model)
            .map(|info| info.provider.clone())
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let adapter = self.resolve(&request)?;
        adapter.complete(request).await
    }

    pub async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, ProviderError> {
        let adapter = self.resolve(&request)?;
        adapter.stream(request).await
    }

    /// Explicit provider first, then the provider serving the requested model,
    /// then the default.
    fn resolve(&self, request: &CompletionRequest) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let provider = request
            .provider
            .clone()
            .or_else(|| request.model.as_deref().and_then(|m| self.provider_for_model(m)))
            .unwrap_or_else(|| self.default_provider.clone());
        self.providers.get(&provider).cloned().ok_or_else(|| {
            ProviderError::new("provider_missing", &format!("provider not registered: {}", provider), false)
        })
    }
}

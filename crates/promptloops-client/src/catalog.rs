use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::OpenRouterClient;

/// A selectable backend model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Where a catalog came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Remote,
    /// Remote fetch failed; `reason` is shown alongside the list
    Fallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
    pub source: CatalogSource,
}

impl ModelCatalog {
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            models: fallback_models(),
            source: CatalogSource::Fallback {
                reason: reason.into(),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, CatalogSource::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match &self.source {
            CatalogSource::Fallback { reason } => Some(reason),
            CatalogSource::Remote => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.iter().any(|m| m.id == id)
    }

    /// Display name for a model id, falling back to the id itself
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.models
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.name.as_str())
            .unwrap_or(id)
    }
}

/// Static catalog used whenever the remote list is unavailable
pub fn fallback_models() -> Vec<ModelInfo> {
    [
        ("google/gemini-2.0-flash-001", "Gemini 2.0 Flash"),
        ("google/gemini-2.5-pro", "Gemini 2.5 Pro"),
        ("openai/gpt-4o", "GPT-4o"),
        ("openai/gpt-4o-mini", "GPT-4o Mini"),
        ("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet"),
        ("anthropic/claude-3-haiku", "Claude 3 Haiku"),
        ("meta-llama/llama-3.3-70b-instruct", "Llama 3.3 70B Instruct"),
        ("mistralai/mistral-large", "Mistral Large"),
        ("deepseek/deepseek-chat", "DeepSeek V3"),
    ]
    .into_iter()
    .map(|(id, name)| ModelInfo::new(id, name))
    .collect()
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<RemoteModel>,
}

#[derive(Debug, Deserialize)]
struct RemoteModel {
    id: String,
    name: Option<String>,
}

/// Fetch the remote model list, substituting the static catalog on any failure
pub async fn fetch_catalog(client: &OpenRouterClient) -> ModelCatalog {
    match fetch_remote(client).await {
        Ok(models) if !models.is_empty() => {
            debug!(count = models.len(), "Fetched remote model catalog");
            ModelCatalog {
                models,
                source: CatalogSource::Remote,
            }
        }
        Ok(_) => {
            warn!("Remote model catalog was empty, using fallback models");
            ModelCatalog::fallback("remote catalog was empty")
        }
        Err(reason) => {
            warn!(reason = %reason, "Using fallback models");
            ModelCatalog::fallback(reason)
        }
    }
}

async fn fetch_remote(client: &OpenRouterClient) -> Result<Vec<ModelInfo>, String> {
    let url = format!("{}/models", client.config().api_base());
    let response = client
        .http_client()
        .get(&url)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("model list request failed with {}", response.status()));
    }

    let body: ModelsResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(body
        .data
        .into_iter()
        .map(|m| {
            let name = m.name.unwrap_or_else(|| m.id.clone());
            ModelInfo::new(m.id, name)
        })
        .collect())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{LlmSettings, ScoringSettings};

// --- Capability trait ---

/// One interface for everything the pipeline asks a model backend to do:
/// free-text generation (tailoring) and embeddings (scoring). Strategies are
/// chosen once at construction, never per call.
pub trait AiBackend: Send + Sync {
    fn generate_text(&self, prompt: &str) -> Result<String>;
    fn generate_embedding(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
}

fn resolve_provider(name: &str) -> Option<ProviderKind> {
    match name.to_lowercase().as_str() {
        "openai" => Some(ProviderKind::OpenAi),
        _ => None,
    }
}

/// Build the text-generation backend, or `None` when no provider is usable.
/// A missing key or unknown provider name is a degraded mode, not an error.
pub fn create_text_backend(settings: &LlmSettings, timeout_secs: u64) -> Option<Arc<dyn AiBackend>> {
    let Some(kind) = resolve_provider(&settings.provider) else {
        warn!(provider = %settings.provider, "unsupported llm provider, tailoring disabled");
        return None;
    };
    let Some(api_key) = settings.api_key.clone() else {
        warn!(provider = %settings.provider, "no api key, tailoring disabled");
        return None;
    };
    match kind {
        ProviderKind::OpenAi => {
            match OpenAiBackend::new(api_key, settings.model.clone(), settings.temperature, timeout_secs) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(error) => {
                    warn!(%error, "failed to build llm backend");
                    None
                }
            }
        }
    }
}

/// Build the embedding backend for the scorer, or `None` to score
/// lexical-only.
pub fn create_embedding_backend(
    settings: &ScoringSettings,
    timeout_secs: u64,
) -> Option<Arc<dyn AiBackend>> {
    let Some(kind) = resolve_provider(&settings.provider) else {
        warn!(provider = %settings.provider, "unsupported scoring provider, using lexical fallback");
        return None;
    };
    let Some(api_key) = settings.api_key.clone() else {
        warn!(provider = %settings.provider, "no api key, using lexical fallback");
        return None;
    };
    match kind {
        ProviderKind::OpenAi => {
            match OpenAiBackend::new(api_key, settings.embedding_model.clone(), 0.0, timeout_secs) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(error) => {
                    warn!(%error, "failed to build embedding backend");
                    None
                }
            }
        }
    }
}

// --- OpenAI provider ---

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

const SYSTEM_PROMPT: &str = "You are a meticulous resume editor. Only rewrite sections that need \
     to align with the job description. Never invent experience.";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug)]
pub struct OpenAiBackend {
    api_key: String,
    model_id: String,
    temperature: f64,
    client: reqwest::blocking::Client,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model_id: String, temperature: f64, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            model_id,
            temperature,
            client,
        })
    }
}

impl AiBackend for OpenAiBackend {
    fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model_id.clone(),
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI chat request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: ChatResponse = response
            .json()
            .context("Failed to parse OpenAI chat response")?;

        api_response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("No choices in OpenAI chat response"))
    }

    fn generate_embedding(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>> {
        let request = EmbeddingRequest {
            model: &self.model_id,
            input: texts,
        };

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI embeddings API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI embeddings request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: EmbeddingResponse = response
            .json()
            .context("Failed to parse OpenAI embeddings response")?;

        if api_response.data.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings, got {}",
                texts.len(),
                api_response.data.len()
            ));
        }

        Ok(api_response.data.into_iter().map(|item| item.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

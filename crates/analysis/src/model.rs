//! HTTP client for the content-analysis collaborator
//!
//! The collaborator is an OpenAI-compatible chat completion endpoint. Only
//! the response's first message content is consumed; everything rubric- or
//! parsing-related lives in the stage modules.

use presence_common::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Content-analysis service configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model identifier
    pub model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ANALYSIS_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("ANALYSIS_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Content-analysis collaborator trait
#[async_trait::async_trait]
pub trait AnalysisModel: Send + Sync {
    /// Send one prompt and return the raw free-form completion text
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// HTTP client for an OpenAI-compatible chat completion endpoint
pub struct HttpAnalysisModel {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl HttpAnalysisModel {
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait::async_trait]
impl AnalysisModel for HttpAnalysisModel {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ModelUnavailable(format!(
                "analysis service returned {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                PipelineError::ModelUnavailable("analysis service returned no choices".to_string())
            })
    }
}

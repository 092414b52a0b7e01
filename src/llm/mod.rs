//! Chat-completion access and reply parsing.
//!
//! The rest of the crate talks to a model only through the [`ChatModel`]
//! trait. [`client::OpenAiCompatClient`] is the production implementation;
//! tests substitute scripted models.

pub mod client;
pub mod extract;
pub mod parse;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

pub use client::OpenAiCompatClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of a `POST /chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

/// Something that can answer a chat-completion request with text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// A model the app offers in its picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub label: String,
    /// Whether the model honours `response_format: json_schema`.
    #[serde(default)]
    pub structured_output: bool,
}

/// The set of models users may pick from, plus the defaults per feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
    pub default_model: String,
    pub coach_model: String,
}

impl ModelCatalog {
    pub fn resolve(&self, id: &str) -> Result<&ModelInfo, LlmError> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| LlmError::UnknownModel(id.to_string()))
    }

    /// Resolve `requested`, falling back to the analysis default.
    pub fn pick(&self, requested: Option<&str>) -> Result<&ModelInfo, LlmError> {
        self.resolve(requested.filter(|s| !s.is_empty()).unwrap_or(self.default_model.as_str()))
    }

    /// Resolve `requested`, falling back to the coach default.
    pub fn pick_coach(&self, requested: Option<&str>) -> Result<&ModelInfo, LlmError> {
        self.resolve(requested.filter(|s| !s.is_empty()).unwrap_or(self.coach_model.as_str()))
    }
}

/// Built-in model list for the GitHub Models inference endpoint.
pub fn default_models() -> Vec<ModelInfo> {
    [
        ("microsoft/Phi-4", "Fast Phi-4", false),
        ("mistral-ai/Ministral-3B", "Fastest Ministral-3B", false),
        ("openai/gpt-4.1", "Fast GPT-4.1", true),
        ("deepseek/DeepSeek-R1", "Slowest DeepSeek-R1", false),
    ]
    .into_iter()
    .map(|(id, label, structured_output)| ModelInfo {
        id: id.to_string(),
        label: label.to_string(),
        structured_output,
    })
    .collect()
}

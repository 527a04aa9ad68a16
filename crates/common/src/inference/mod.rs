//! Inference gateway abstraction
//!
//! Two operations against an external model-serving endpoint:
//! - extractive question answering over a context string
//! - chat completion (used for summaries)
//!
//! Provider responses vary in shape, so each response type is an untagged
//! enum of the shapes we recognise. `into_answer` / `into_text` normalize
//! exactly once and fail loudly on anything else.

mod mock;

pub use mock::MockGateway;

use crate::config::InferenceConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Extractive QA request
#[derive(Debug, Clone, Copy)]
pub struct QaRequest<'a> {
    pub model: &'a str,
    pub question: &'a str,
    pub context: &'a str,
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
}

/// Answer span returned by extractive QA models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSpan {
    pub answer: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

/// Raw QA response as returned by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QaResponse {
    /// `{"answer": "...", "score": .., "start": .., "end": ..}`
    Span(AnswerSpan),
    /// Ranked candidates (`top_k > 1`), best first
    Ranked(Vec<AnswerSpan>),
    /// Bare answer string
    Text(String),
    /// Anything else
    Other(serde_json::Value),
}

impl QaResponse {
    /// Reduce to the single answer string
    pub fn into_answer(self) -> Result<String> {
        match self {
            QaResponse::Span(span) => Ok(span.answer),
            QaResponse::Ranked(spans) => spans
                .into_iter()
                .next()
                .map(|span| span.answer)
                .ok_or_else(|| AppError::Inference {
                    message: "QA response contained no candidates".to_string(),
                }),
            QaResponse::Text(text) => Ok(text),
            QaResponse::Other(value) => Err(AppError::Inference {
                message: format!("Unrecognised QA response shape: {}", truncate(&value.to_string())),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<ChatChoice>,
}

/// Raw chat response as returned by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Completion(ChatCompletion),
    Other(serde_json::Value),
}

impl ChatResponse {
    /// Text content of the first choice
    pub fn into_text(self) -> Result<String> {
        match self {
            ChatResponse::Completion(completion) => completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| AppError::Inference {
                    message: "Chat response had no message content".to_string(),
                }),
            ChatResponse::Other(value) => Err(AppError::Inference {
                message: format!("Unrecognised chat response shape: {}", truncate(&value.to_string())),
            }),
        }
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(200).collect()
}

/// Trait for the external model-serving boundary
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Extract an answer span for `question` from `context`
    async fn question_answering(&self, request: QaRequest<'_>) -> Result<QaResponse>;

    /// Generate a chat completion
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Hugging Face inference client
pub struct HuggingFaceGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    qa_endpoint: String,
    chat_endpoint: String,
    chat_provider: Option<String>,
}

#[derive(Serialize)]
struct QaInputs<'a> {
    question: &'a str,
    context: &'a str,
}

#[derive(Serialize)]
struct QaBody<'a> {
    inputs: QaInputs<'a>,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: String,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl HuggingFaceGateway {
    /// Create a new client from configuration
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            qa_endpoint: config.qa_endpoint.trim_end_matches('/').to_string(),
            chat_endpoint: config.chat_endpoint.clone(),
            chat_provider: config.chat_provider.clone(),
        })
    }

    /// Chat model id with the routing provider suffix, if any
    fn routed_model(&self, model: &str) -> String {
        match &self.chat_provider {
            Some(provider) if !provider.is_empty() => format!("{}:{}", model, provider),
            _ => model.to_string(),
        }
    }

    async fn post<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| AppError::Inference {
            message: format!("Request to {} failed: {}", url, e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Inference {
                message: format!("API error {}: {}", status, truncate(&body)),
            });
        }

        response.json().await.map_err(|e| AppError::Inference {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl InferenceGateway for HuggingFaceGateway {
    async fn question_answering(&self, request: QaRequest<'_>) -> Result<QaResponse> {
        let url = format!("{}/{}", self.qa_endpoint, request.model);
        let body = QaBody {
            inputs: QaInputs {
                question: request.question,
                context: request.context,
            },
        };
        self.post(&url, &body).await
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = ChatBody {
            model: self.routed_model(&request.model),
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };
        self.post(&self.chat_endpoint, &body).await
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// Create a gateway based on configuration
pub fn create_gateway(config: &InferenceConfig) -> Result<Arc<dyn InferenceGateway>> {
    match config.provider.as_str() {
        "huggingface" => {
            if config.api_key.is_none() {
                tracing::warn!("No inference API key configured, provider calls will be anonymous");
            }
            Ok(Arc::new(HuggingFaceGateway::new(config)?))
        }
        "mock" => Ok(Arc::new(MockGateway::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown inference provider: {}", other),
        }),
    }
}

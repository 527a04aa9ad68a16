//! Offline gateway for development and tests

use super::{
    AnswerSpan, ChatChoice, ChatCompletion, ChatRequest, ChatResponse, ChoiceMessage,
    InferenceGateway, QaRequest, QaResponse,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    /// Derive responses from the request itself
    Echo,
    /// Always answer / summarize with this text
    Fixed(String),
    /// Every call fails
    Fail,
    /// Every call returns a shape nothing can normalize
    Malformed,
}

/// Deterministic gateway that never leaves the process
///
/// By default the QA answer is the first sentence of the context and the
/// summary is a four-section document built from that sentence.
pub struct MockGateway {
    behavior: Behavior,
    delay: Option<Duration>,
    qa_calls: AtomicUsize,
    chat_calls: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            behavior: Behavior::Echo,
            delay: None,
            qa_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
        }
    }

    /// Respond to every call with `text`
    pub fn with_answer(mut self, text: impl Into<String>) -> Self {
        self.behavior = Behavior::Fixed(text.into());
        self
    }

    /// Fail every call
    pub fn failing(mut self) -> Self {
        self.behavior = Behavior::Fail;
        self
    }

    /// Return unrecognisable payloads
    pub fn malformed(mut self) -> Self {
        self.behavior = Behavior::Malformed;
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of question-answering calls received
    pub fn qa_calls(&self) -> usize {
        self.qa_calls.load(Ordering::SeqCst)
    }

    /// Number of chat completion calls received
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    match text.find(['.', '!', '?']) {
        Some(end) => text[..=end].to_string(),
        None => text.to_string(),
    }
}

fn completion(content: String) -> ChatResponse {
    ChatResponse::Completion(ChatCompletion {
        choices: vec![ChatChoice {
            message: ChoiceMessage {
                role: Some("assistant".to_string()),
                content: Some(content),
            },
        }],
    })
}

fn echo_summary(request: &ChatRequest) -> String {
    let prompt = request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    let text = prompt.rsplit_once("Text:").map(|(_, t)| t).unwrap_or(prompt);
    let gist = first_sentence(text);

    format!(
        "### Simple Summary\n{gist}\n\n\
         ### Action Checklist\n- Review: {gist}\n\n\
         ### Risk Red Flags\n- None identified\n\n\
         ### Deadline Highlights\n- See: {gist}\n"
    )
}

#[async_trait]
impl InferenceGateway for MockGateway {
    async fn question_answering(&self, request: QaRequest<'_>) -> Result<QaResponse> {
        self.qa_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match &self.behavior {
            Behavior::Echo => Ok(QaResponse::Span(AnswerSpan {
                answer: first_sentence(request.context),
                score: Some(1.0),
                start: Some(0),
                end: None,
            })),
            Behavior::Fixed(text) => Ok(QaResponse::Text(text.clone())),
            Behavior::Fail => Err(AppError::Inference {
                message: "mock gateway configured to fail".to_string(),
            }),
            Behavior::Malformed => Ok(QaResponse::Other(serde_json::json!({"unexpected": true}))),
        }
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match &self.behavior {
            Behavior::Echo => Ok(completion(echo_summary(&request))),
            Behavior::Fixed(text) => Ok(completion(text.clone())),
            Behavior::Fail => Err(AppError::Inference {
                message: "mock gateway configured to fail".to_string(),
            }),
            Behavior::Malformed => Ok(ChatResponse::Other(serde_json::json!({"choices": null}))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

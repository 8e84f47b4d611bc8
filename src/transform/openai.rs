//! OpenAI-backed transformer implementation.

use super::{TransformMode, Transformer};
use crate::error::{Result, SkrivError};
use crate::openai::{create_client_with_timeout, scaled_timeout};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::debug;

/// Instruction for the chapter-planning call.
const PLANNING_INSTRUCTION: &str =
    "You are given numbered summaries of consecutive transcript chunks. \
     Propose a chapter structure as a JSON array of objects with fields \
     \"title\" and \"start_chunk_index\". Chapters must be ordered by \
     start_chunk_index and the first chapter must start at index 0.";

/// Transformer that calls the OpenAI chat completions API.
///
/// A fresh client is built per call so the request timeout can scale with
/// the payload size.
pub struct OpenAiTransformer {
    model: String,
    temperature: f32,
}

impl OpenAiTransformer {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: 0.3,
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let client = create_client_with_timeout(scaled_timeout(user.chars().count()));

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| SkrivError::Transform(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| SkrivError::Transform(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SkrivError::Transform(e.to_string()))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkrivError::OpenAI(format!("Chat completion failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SkrivError::Transform("Empty response from LLM".to_string()))?;

        debug!("Received {} chars from {}", content.len(), self.model);
        Ok(content)
    }
}

#[async_trait]
impl Transformer for OpenAiTransformer {
    async fn transform(&self, mode: TransformMode, text: &str) -> Result<String> {
        self.complete(mode.instruction(), text).await
    }

    async fn plan_chapters(&self, summaries: &[String]) -> Result<String> {
        let numbered: String = summaries
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}\n", i, s.trim()))
            .collect();
        self.complete(PLANNING_INSTRUCTION, &numbered).await
    }
}

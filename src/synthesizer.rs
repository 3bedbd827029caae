//! Answer synthesis.
//!
//! Submits one composed prompt to the [`CompletionService`] and turns the
//! outcome into a [`ChatResponse`]. Every failure becomes a fallback answer
//! with empty evidence; nothing here returns an error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::completion::{CompletionService, GenerationOptions};
use crate::context;
use crate::error::{AssistantError, FailureClass};
use crate::models::Document;

/// What the caller displays: answer text plus the documents it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub evidence: Vec<Document>,
    /// Set when `text` is a fallback message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureClass>,
}

impl ChatResponse {
    pub fn fallback(err: &AssistantError) -> Self {
        Self {
            text: err.fallback_text().to_string(),
            evidence: Vec::new(),
            failure: Some(err.class()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

pub struct Synthesizer {
    service: Arc<dyn CompletionService>,
    temperature: f32,
    max_output_tokens: u32,
}

impl Synthesizer {
    pub fn new(
        service: Arc<dyn CompletionService>,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            service,
            temperature,
            max_output_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    /// Make exactly one completion call (none if pre-flight fails).
    ///
    /// On success `evidence` is returned unchanged as the provenance record.
    pub async fn synthesize(
        &self,
        system_instruction: &str,
        context_block: &str,
        user_query: &str,
        evidence: Vec<Document>,
    ) -> ChatResponse {
        let prompt = context::build_prompt(context_block, user_query);
        match self.generate(system_instruction, &prompt).await {
            Ok(text) => ChatResponse {
                text,
                evidence,
                failure: None,
            },
            Err(err) => {
                tracing::warn!(
                    class = ?err.class(),
                    error = %err,
                    model = self.service.model_name(),
                    "completion failed; returning fallback answer"
                );
                ChatResponse::fallback(&err)
            }
        }
    }

    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, AssistantError> {
        self.service.preflight()?;

        let options = GenerationOptions {
            system_instruction: system_instruction.to_string(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };
        tracing::debug!(
            prompt_chars = prompt.chars().count(),
            model = self.service.model_name(),
            "sending completion request"
        );

        let completion = self.service.generate(prompt, &options).await?;
        match completion.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(AssistantError::EmptyResult),
        }
    }
}

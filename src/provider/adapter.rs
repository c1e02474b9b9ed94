//! [`ChatProvider`] over any `edgequake-llm` provider.
//!
//! Requests go out as a system message plus one user message; the page image,
//! when present, rides on the user message at `detail: high`. JSON-object
//! response format is always requested. Nothing here retries: a rejected
//! request surfaces as a typed [`MedExtractError`].

use super::{ChatProvider, JsonRequest};
use crate::error::MedExtractError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Wraps an `Arc<dyn LLMProvider>` as a JSON-mode [`ChatProvider`].
#[derive(Clone)]
pub struct LlmChatProvider {
    inner: Arc<dyn LLMProvider>,
}

impl std::fmt::Debug for LlmChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmChatProvider")
            .field("name", &self.inner.name())
            .field("model", &self.inner.model())
            .finish()
    }
}

impl LlmChatProvider {
    pub fn new(inner: Arc<dyn LLMProvider>) -> Self {
        Self { inner }
    }

    fn messages(request: &JsonRequest) -> Vec<ChatMessage> {
        let user = match request.image {
            Some(ref image) => {
                ChatMessage::user_with_images(&request.text, vec![image.to_image_data()])
            }
            None => ChatMessage::user(&request.text),
        };
        vec![ChatMessage::system(&request.system), user]
    }

    fn options(request: &JsonRequest) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(request.temperature),
            ..CompletionOptions::json_mode()
        }
    }
}

#[async_trait]
impl ChatProvider for LlmChatProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete_json(&self, request: &JsonRequest) -> Result<String, MedExtractError> {
        let start = Instant::now();
        let messages = Self::messages(request);
        let options = Self::options(request);

        let response = self
            .inner
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| MedExtractError::from_llm(self.inner.name(), e))?;

        debug!(
            "{} ({}): {} prompt + {} completion tokens in {:?}",
            self.inner.name(),
            self.inner.model(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(MedExtractError::EmptyReply {
                provider: self.inner.name().to_string(),
            });
        }
        Ok(response.content)
    }
}

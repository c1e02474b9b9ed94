//! The remote-model boundary.
//!
//! Both pipeline stages need the same capability: send a system prompt and
//! a user payload (text, optionally one image) to a hosted chat model in
//! JSON-object mode, and get the raw reply text back. [`ChatProvider`] is
//! that capability; the extractor and transformer depend on nothing else,
//! so a test double can be plugged in. Hosted models are reached through
//! `edgequake-llm` via [`LlmChatProvider`].

pub mod adapter;

use crate::config::{PipelineConfig, ProviderConfig};
use crate::error::MedExtractError;
use crate::pipeline::encode::PageImage;
use async_trait::async_trait;
use edgequake_llm::{ConfigProviderType, LLMProvider, OpenAICompatibleProvider};
use std::sync::Arc;
use tracing::debug;

pub use adapter::LlmChatProvider;

/// One JSON-mode completion request.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub system: String,
    pub text: String,
    pub image: Option<PageImage>,
    pub temperature: f32,
}

impl JsonRequest {
    /// Temperature 0: greedy decoding, so the same page yields the same reply
    /// as far as the provider allows.
    pub fn new(system: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            text: text.into(),
            image: None,
            temperature: 0.0,
        }
    }

    pub fn with_image(mut self, image: PageImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// A hosted chat-completion model that can answer in JSON-object mode.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Model every request is sent to.
    fn model(&self) -> &str;

    /// Send the request and return the raw reply content.
    async fn complete_json(&self, request: &JsonRequest) -> Result<String, MedExtractError>;
}

/// Resolve the provider for one stage, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is for both
///    stages. This is how tests inject a mock; `model` is ignored.
/// 2. **Explicit provider config** (`config.provider_config`).
/// 3. **Environment** via [`ProviderConfig::from_env`]; a missing
///    credential is a fatal error here.
///
/// For 2 and 3, `model` (or the preset's default) is bound to the client.
pub fn resolve_provider(
    config: &PipelineConfig,
    model: Option<&str>,
) -> Result<Arc<dyn ChatProvider>, MedExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let provider_config = match config.provider_config {
        Some(ref pc) => pc.clone(),
        None => ProviderConfig::from_env(None)?,
    };
    let model = model.unwrap_or(provider_config.kind.default_model());

    let inner = build_openai_compatible(&provider_config, model)?;
    Ok(Arc::new(LlmChatProvider::new(inner)))
}

/// Build an `edgequake-llm` OpenAI-compatible client for `provider_config`.
///
/// The client reads the key from `provider_config.credential_var` itself; an
/// unset or blank variable is reported as [`MedExtractError::MissingCredential`].
pub fn build_openai_compatible(
    provider_config: &ProviderConfig,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, MedExtractError> {
    let var = &provider_config.credential_var;
    if std::env::var(var).map_or(true, |v| v.trim().is_empty()) {
        return Err(MedExtractError::MissingCredential { var: var.clone() });
    }

    let kind = provider_config.kind;
    let llm_config = edgequake_llm::ProviderConfig {
        name: kind.name().to_string(),
        display_name: kind.to_string(),
        provider_type: ConfigProviderType::OpenAICompatible,
        api_key_env: Some(var.clone()),
        base_url: Some(provider_config.base_url.clone()),
        default_llm_model: Some(model.to_string()),
        ..Default::default()
    };

    let provider = OpenAICompatibleProvider::from_config(llm_config)
        .map_err(|e| MedExtractError::from_llm(kind.name(), e))?;
    debug!("Built {} client for {} at {}", kind, model, provider_config.base_url);
    Ok(Arc::new(provider))
}

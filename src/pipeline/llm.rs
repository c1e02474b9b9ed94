//! Model interaction: assemble the two request kinds and send them.
//!
//! This module stays thin on purpose. Prompt text lives in
//! [`crate::prompts`], the wire format lives behind
//! [`ChatProvider`], and reply parsing lives in [`super::reply`]. Both
//! functions return the raw reply unvalidated and do not retry; a failed
//! call propagates to the driver.

use crate::error::MedExtractError;
use crate::output::TargetSchema;
use crate::pipeline::encode::PageImage;
use crate::prompts::{
    transform_system_prompt, transform_user_message, EXTRACTION_SYSTEM_PROMPT,
    EXTRACTION_USER_TEXT,
};
use crate::provider::{ChatProvider, JsonRequest};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Ask the vision model for the clinical fields on one page.
///
/// ## Message Layout
///
/// 1. **System message**: the four-field extraction prompt
/// 2. **User message**: a short instruction plus the page PNG (`detail: high`)
pub async fn extract_page(
    provider: &dyn ChatProvider,
    page: &PageImage,
) -> Result<String, MedExtractError> {
    let start = Instant::now();
    let request =
        JsonRequest::new(EXTRACTION_SYSTEM_PROMPT, EXTRACTION_USER_TEXT).with_image(page.clone());

    let reply = provider.complete_json(&request).await?;
    debug!(
        "Page {}: {} chars from {}/{} in {:?}",
        page.page_num,
        reply.len(),
        provider.name(),
        provider.model(),
        start.elapsed()
    );
    Ok(reply)
}

/// Ask the text model to reshape `raw` so it matches `schema`.
///
/// `raw` is a single page record or a whole report, depending on
/// [`crate::config::TransformUnit`].
pub async fn transform_record(
    provider: &dyn ChatProvider,
    raw: &Value,
    schema: &TargetSchema,
) -> Result<String, MedExtractError> {
    let request = JsonRequest::new(
        transform_system_prompt(schema.as_value()),
        transform_user_message(raw),
    );

    provider.complete_json(&request).await
}

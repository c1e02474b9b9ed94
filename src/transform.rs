//! Transformation driver: reshape every extraction report to the target schema.

use crate::config::{PipelineConfig, TransformUnit};
use crate::error::MedExtractError;
use crate::output::{write_json_atomic, TargetSchema, TransformSummary, TransformedFile};
use crate::pipeline::discover::{discover_extractions, display_name, transformed_file_name};
use crate::pipeline::llm::transform_record;
use crate::pipeline::reply::parse_json_reply;
use crate::provider::{resolve_provider, ChatProvider};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Transform every `*_extracted.json` in `config.extract_dir` into
/// `config.transform_dir/transformed_<name>`.
///
/// The schema is loaded before anything else, so a missing or malformed
/// schema fails without touching the network. Every error is fatal.
pub async fn transform_directory(
    config: &PipelineConfig,
) -> Result<TransformSummary, MedExtractError> {
    let schema = TargetSchema::load(&config.schema_path)?;
    let provider = resolve_provider(config, config.transformation_model.as_deref())?;
    transform_with(provider.as_ref(), &schema, config).await
}

/// [`transform_directory`] with the schema loaded and provider chosen.
///
/// An extract directory that does not exist yet holds no reports: extraction
/// creates it on first write, so an empty input leaves it absent.
pub async fn transform_with(
    provider: &dyn ChatProvider,
    schema: &TargetSchema,
    config: &PipelineConfig,
) -> Result<TransformSummary, MedExtractError> {
    let start = Instant::now();
    let files = if config.extract_dir.exists() {
        discover_extractions(&config.extract_dir)?
    } else {
        debug!("{} does not exist", config.extract_dir.display());
        Vec::new()
    };
    info!(
        "Found {} extraction report(s) in {}",
        files.len(),
        config.extract_dir.display()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_transform_start(files.len());
    }

    let mut summary = TransformSummary::default();
    for file in &files {
        let name = display_name(file);
        info!("Transforming {}", name);

        let raw = load_extraction(file)?;
        let (value, calls) = match config.transform_unit {
            TransformUnit::Report => (transform_one(provider, &raw, schema, &name).await?, 1),
            TransformUnit::PerRecord => {
                let records = match raw {
                    Value::Array(items) => items,
                    single => vec![single],
                };
                let mut out = Vec::with_capacity(records.len());
                for (i, record) in records.iter().enumerate() {
                    let context = format!("{} record {}", name, i + 1);
                    out.push(transform_one(provider, record, schema, &context).await?);
                }
                let calls = out.len();
                (Value::Array(out), calls)
            }
        };

        let output =
            write_json_atomic(&config.transform_dir, &transformed_file_name(file), &value)?;
        info!("Saved: {}", output.display());
        if let Some(ref cb) = config.progress_callback {
            cb.on_transform_file_complete(&name, &output);
        }

        summary.transformed.push(TransformedFile {
            source: file.clone(),
            output,
            calls,
        });
    }

    summary.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Transformation complete: {} written, {}ms",
        summary.transformed.len(),
        summary.duration_ms
    );
    Ok(summary)
}

async fn transform_one(
    provider: &dyn ChatProvider,
    raw: &Value,
    schema: &TargetSchema,
    context: &str,
) -> Result<Value, MedExtractError> {
    let reply = transform_record(provider, raw, schema).await?;
    debug!("{}: {} chars", context, reply.len());
    parse_json_reply(&reply, context)
}

fn load_extraction(path: &Path) -> Result<Value, MedExtractError> {
    let unreadable = |detail: String| MedExtractError::ExtractionUnreadable {
        path: path.to_path_buf(),
        detail,
    };
    let text = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))
}

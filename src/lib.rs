//! # medchart-extract
//!
//! Pull structured clinical fields out of scanned medical-chart PDFs with a
//! vision-capable chat model, then reshape the results to a target JSON
//! schema with a text model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input_dir/*.pdf
//!  │
//!  ├─ 1. Render     rasterise every page via pdfium (spawn_blocking)
//!  ├─ 2. Encode     PNG → base64
//!  ├─ 3. Extract    one vision call per page, JSON-object mode
//!  └─ 4. Report     extract_dir/<stem>_extracted.json  (one entry per page)
//!
//! extract_dir/*_extracted.json
//!  │
//!  ├─ 5. Transform  one text call per report (or per record) with the schema
//!  └─ 6. Output     transform_dir/transformed_<stem>_extracted.json
//! ```
//!
//! Calls are made one at a time, in file-name and page order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medchart_extract::{run, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential from OPENAI_API_KEY, else GROQ_API_KEY
//!     let config = PipelineConfig::builder()
//!         .input_dir("./scans")
//!         .extract_dir("./out/raw")
//!         .schema_path("./schema.json")
//!         .transform_dir("./out/final")
//!         .build()?;
//!     let summary = run(&config).await?;
//!     eprintln!(
//!         "{} reports, {} transformed",
//!         summary.extraction.extracted.len(),
//!         summary.transformation.transformed.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | `medextract` binary (clap, anyhow, tracing-subscriber, indicatif) |
//!
//! ```toml
//! medchart-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PipelineConfig, PipelineConfigBuilder, ProviderConfig, ProviderKind, TransformUnit,
};
pub use error::MedExtractError;
pub use extract::{extract_directory, extract_with};
pub use output::{
    ExtractionRecord, ExtractionReport, ExtractionSummary, OverallHealth, PipelineSummary,
    TargetSchema, TransformSummary,
};
pub use pipeline::encode::PageImage;
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback};
pub use provider::{ChatProvider, JsonRequest, LlmChatProvider};
pub use transform::{transform_directory, transform_with};

use tracing::info;

/// Run extraction over `config.input_dir`, then transformation over
/// `config.extract_dir`.
///
/// Both providers are resolved and the schema is loaded before any PDF is
/// opened, so a missing credential or a bad schema costs no remote calls.
pub async fn run(config: &PipelineConfig) -> Result<PipelineSummary, MedExtractError> {
    let extractor = provider::resolve_provider(config, config.extraction_model.as_deref())?;
    let transformer = provider::resolve_provider(config, config.transformation_model.as_deref())?;
    let renderer = extract::resolve_renderer(config);
    let schema = TargetSchema::load(&config.schema_path)?;
    info!(
        "Using provider {} (extraction: {}, transformation: {})",
        extractor.name(),
        extractor.model(),
        transformer.model()
    );

    let extraction = extract_with(extractor.as_ref(), renderer.as_ref(), config).await?;
    let transformation = transform_with(transformer.as_ref(), &schema, config).await?;

    Ok(PipelineSummary {
        extraction,
        transformation,
    })
}

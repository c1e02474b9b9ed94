//! Extraction driver: every PDF in a directory → one JSON report per PDF.

use crate::config::PipelineConfig;
use crate::error::MedExtractError;
use crate::output::{
    write_json_atomic, ExtractedFile, ExtractionReport, ExtractionSummary, SkippedFile,
};
use crate::pipeline::discover::{discover_pdfs, display_name, extraction_file_name};
use crate::pipeline::llm::extract_page;
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::pipeline::reply::parse_json_reply;
use crate::provider::{resolve_provider, ChatProvider};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract every `*.pdf` in `config.input_dir` into `config.extract_dir`.
///
/// # Errors
/// A PDF that cannot be opened or rendered is skipped and listed in
/// [`ExtractionSummary::skipped`]. Everything else is fatal:
/// - input directory unreadable
/// - missing credential, pdfium not found
/// - any remote failure, including a reply that is not JSON
/// - report write failure
///
/// A PDF whose page call fails gets no report.
pub async fn extract_directory(
    config: &PipelineConfig,
) -> Result<ExtractionSummary, MedExtractError> {
    let provider = resolve_provider(config, config.extraction_model.as_deref())?;
    let renderer = resolve_renderer(config);
    extract_with(provider.as_ref(), renderer.as_ref(), config).await
}

/// [`extract_directory`] with the provider and renderer already chosen.
pub async fn extract_with(
    provider: &dyn ChatProvider,
    renderer: &dyn PageRenderer,
    config: &PipelineConfig,
) -> Result<ExtractionSummary, MedExtractError> {
    let start = Instant::now();
    let pdfs = discover_pdfs(&config.input_dir)?;
    info!("Found {} PDF(s) in {}", pdfs.len(), config.input_dir.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(pdfs.len());
    }

    let mut summary = ExtractionSummary::default();
    for pdf in &pdfs {
        match extract_file(provider, renderer, pdf, config).await {
            Ok(done) => {
                summary.total_pages += done.page_count;
                summary.extracted.push(done);
            }
            Err(e) if e.is_document_error() => {
                let name = display_name(pdf);
                warn!("Skipping {}: {}", name, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_skipped(&name, &e.to_string());
                }
                summary.skipped.push(SkippedFile {
                    source: pdf.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    summary.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extraction complete: {} written, {} skipped, {} pages, {}ms",
        summary.extracted.len(),
        summary.skipped.len(),
        summary.total_pages,
        summary.duration_ms
    );
    Ok(summary)
}

async fn extract_file(
    provider: &dyn ChatProvider,
    renderer: &dyn PageRenderer,
    pdf: &Path,
    config: &PipelineConfig,
) -> Result<ExtractedFile, MedExtractError> {
    let name = display_name(pdf);
    info!("Processing {}", name);

    let pages = renderer.render(pdf).await?;
    let total = pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(&name, total);
    }

    let mut records = Vec::with_capacity(total);
    for page in &pages {
        let reply = extract_page(provider, page).await?;
        let value = parse_json_reply(&reply, &format!("{} page {}", name, page.page_num))?;
        records.push(value);
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(&name, page.page_num, total);
        }
    }

    let report = ExtractionReport::new(records);
    debug!("{}: {} records", name, report.len());
    for (i, record) in report.typed_records().iter().enumerate() {
        match record {
            Ok(r) => debug!("{} page {}: {}", name, i + 1, r.summary()),
            Err(e) => debug!("{} page {}: unexpected record shape: {}", name, i + 1, e),
        }
    }

    let output = write_json_atomic(&config.extract_dir, &extraction_file_name(pdf), &report)?;
    info!("Saved: {}", output.display());
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_complete(&name, &output);
    }

    Ok(ExtractedFile {
        source: pdf.to_path_buf(),
        output,
        page_count: total,
    })
}

/// Configured renderer, else pdfium with the config's DPI and library path.
pub(crate) fn resolve_renderer(config: &PipelineConfig) -> Arc<dyn PageRenderer> {
    match config.renderer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumRenderer::from_config(config)),
    }
}

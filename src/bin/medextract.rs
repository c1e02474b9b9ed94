//! CLI binary for medchart-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs extraction and then transformation, and prints a
//! summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use medchart_extract::config::{
    DEFAULT_DPI, DEFAULT_EXTRACT_DIR, DEFAULT_INPUT_DIR, DEFAULT_SCHEMA_PATH, DEFAULT_TRANSFORM_DIR,
};
use medchart_extract::{
    extract_directory, run, transform_directory, PipelineConfig, PipelineProgress, ProgressCallback,
    ProviderConfig, ProviderKind, TransformUnit,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar, reused per file: pages during extraction, files during
/// transformation.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn reset_bar(&self, prefix: String, total: usize, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] \
             {{pos:>3}}/{{len}} {unit}  ⏱ {{elapsed_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgress for CliProgress {
    fn on_extraction_start(&self, total_files: usize) {
        self.bar
            .println(bold(&format!("Extracting {total_files} PDF(s)…")));
    }

    fn on_file_start(&self, file: &str, total_pages: usize) {
        self.reset_bar(file.to_string(), total_pages, "pages");
    }

    fn on_page_complete(&self, _file: &str, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_file_complete(&self, file: &str, output: &Path) {
        self.bar.println(format!(
            "  {} {}  →  {}",
            green("✓"),
            file,
            dim(&output.display().to_string())
        ));
    }

    fn on_file_skipped(&self, file: &str, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), file, red(error)));
    }

    fn on_transform_start(&self, total_files: usize) {
        self.bar
            .println(bold(&format!("Transforming {total_files} report(s)…")));
        self.reset_bar("Transforming".to_string(), total_files, "files");
    }

    fn on_transform_file_complete(&self, file: &str, output: &Path) {
        self.bar.println(format!(
            "  {} {}  →  {}",
            green("✓"),
            file,
            dim(&output.display().to_string())
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run both stages over ./data (the defaults)
  medextract

  # Different folders, Groq instead of OpenAI
  medextract --input-dir scans --extract-dir out/raw --output-dir out/final --provider groq

  # Only re-run the transformation, one call per page record
  medextract --skip-extract --per-record

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY     OpenAI API key (preferred when both are set)
  GROQ_API_KEY       Groq API key
  PDFIUM_LIB_PATH    Path to libpdfium (file or directory)
  RUST_LOG           Overrides the log filter
  MEDEXTRACT_*       Fallback for every flag, including the four paths
"#;

/// Extract clinical fields from scanned medical-chart PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "medextract",
    version,
    about = "Extract clinical fields from medical-chart PDFs with a vision model",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory scanned for *.pdf files.
    #[arg(long, env = "MEDEXTRACT_INPUT_DIR", default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Directory for <stem>_extracted.json reports.
    #[arg(long, env = "MEDEXTRACT_EXTRACT_DIR", default_value = DEFAULT_EXTRACT_DIR)]
    extract_dir: PathBuf,

    /// Target JSON schema for the transformation stage.
    #[arg(long, env = "MEDEXTRACT_SCHEMA", default_value = DEFAULT_SCHEMA_PATH)]
    schema: PathBuf,

    /// Directory for transformed_* outputs.
    #[arg(long, env = "MEDEXTRACT_OUTPUT_DIR", default_value = DEFAULT_TRANSFORM_DIR)]
    output_dir: PathBuf,

    /// openai or groq. Detected from the API key env vars if not set.
    #[arg(long, env = "MEDEXTRACT_PROVIDER")]
    provider: Option<String>,

    /// Model for both stages.
    #[arg(long, env = "MEDEXTRACT_MODEL")]
    model: Option<String>,

    /// Model for page extraction (overrides --model).
    #[arg(long, env = "MEDEXTRACT_EXTRACTION_MODEL")]
    extraction_model: Option<String>,

    /// Model for schema transformation (overrides --model).
    #[arg(long, env = "MEDEXTRACT_TRANSFORMATION_MODEL")]
    transformation_model: Option<String>,

    /// OpenAI-compatible base URL, e.g. http://localhost:8000/v1.
    #[arg(long, env = "MEDEXTRACT_BASE_URL")]
    base_url: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "MEDEXTRACT_DPI", default_value_t = DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Transform each page record separately instead of the whole report.
    #[arg(long, env = "MEDEXTRACT_PER_RECORD")]
    per_record: bool,

    /// Skip the extraction stage.
    #[arg(long, env = "MEDEXTRACT_SKIP_EXTRACT", conflicts_with = "skip_transform")]
    skip_extract: bool,

    /// Skip the transformation stage.
    #[arg(long, env = "MEDEXTRACT_SKIP_TRANSFORM")]
    skip_transform: bool,

    /// Disable progress bar.
    #[arg(long, env = "MEDEXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MEDEXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar carries the per-file feedback, so library INFO logs are
    // suppressed while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgress::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;

    let result = execute(&cli, &config).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let (extracted, skipped, transformed) = result?;

    if !cli.quiet {
        let mut line = format!("{} ", green("✔"));
        if let Some(n) = extracted {
            line.push_str(&format!(
                "{} report(s) in {}",
                bold(&n.to_string()),
                cli.extract_dir.display()
            ));
            if skipped > 0 {
                line.push_str(&format!(" ({} skipped)", red(&skipped.to_string())));
            }
        }
        if let Some(n) = transformed {
            if extracted.is_some() {
                line.push_str(", ");
            }
            line.push_str(&format!(
                "{} transformed in {}",
                bold(&n.to_string()),
                cli.output_dir.display()
            ));
        }
        eprintln!("{line}");
    }

    Ok(())
}

/// Returns (reports written, PDFs skipped, outputs transformed); a skipped
/// stage reports `None`.
async fn execute(
    cli: &Cli,
    config: &PipelineConfig,
) -> Result<(Option<usize>, usize, Option<usize>)> {
    if cli.skip_transform {
        let s = extract_directory(config).await.context("Extraction failed")?;
        return Ok((Some(s.extracted.len()), s.skipped.len(), None));
    }
    if cli.skip_extract {
        let s = transform_directory(config)
            .await
            .context("Transformation failed")?;
        return Ok((None, 0, Some(s.transformed.len())));
    }
    let s = run(config).await.context("Pipeline failed")?;
    Ok((
        Some(s.extraction.extracted.len()),
        s.extraction.skipped.len(),
        Some(s.transformation.transformed.len()),
    ))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let kind = cli
        .provider
        .as_deref()
        .map(str::parse::<ProviderKind>)
        .transpose()
        .context("Invalid --provider")?;

    let mut provider_config = ProviderConfig::from_env(kind).context("No API credential found")?;
    if let Some(ref url) = cli.base_url {
        provider_config = provider_config.with_base_url(url);
    }

    let mut builder = PipelineConfig::builder()
        .input_dir(&cli.input_dir)
        .extract_dir(&cli.extract_dir)
        .schema_path(&cli.schema)
        .transform_dir(&cli.output_dir)
        .dpi(cli.dpi)
        .provider_config(provider_config)
        .transform_unit(if cli.per_record {
            TransformUnit::PerRecord
        } else {
            TransformUnit::Report
        });

    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(ref m) = cli.extraction_model {
        builder = builder.extraction_model(m);
    }
    if let Some(ref m) = cli.transformation_model {
        builder = builder.transformation_model(m);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

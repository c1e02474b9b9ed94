//! Configuration types for the extraction and transformation pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. The config is constructed once at process start
//! and passed by reference into every stage; nothing in the library reads
//! global state except [`ProviderConfig::from_env`], which is the single
//! place the API credential is looked up.

use crate::error::MedExtractError;
use crate::pipeline::render::PageRenderer;
use crate::progress::ProgressCallback;
use crate::provider::{ChatProvider, LlmChatProvider};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Directory scanned for `*.pdf` inputs when nothing else is configured.
pub const DEFAULT_INPUT_DIR: &str = "./data";
/// Directory that receives `<stem>_extracted.json` reports.
pub const DEFAULT_EXTRACT_DIR: &str = "./data";
/// Target JSON schema for the transformation stage.
pub const DEFAULT_SCHEMA_PATH: &str = "./data/medical_schema.json";
/// Directory that receives `transformed_*` outputs.
pub const DEFAULT_TRANSFORM_DIR: &str = "./data/final_medical.json";

/// Rendering DPI used when rasterising each page. Default: 200.
pub const DEFAULT_DPI: u32 = 200;

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use medchart_extract::{PipelineConfig, TransformUnit};
///
/// let config = PipelineConfig::builder()
///     .input_dir("./scans")
///     .extract_dir("./out/raw")
///     .schema_path("./schema.json")
///     .transform_dir("./out/final")
///     .dpi(150)
///     .transform_unit(TransformUnit::PerRecord)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory scanned (non-recursively) for `.pdf` files.
    pub input_dir: PathBuf,

    /// Directory where extraction reports are written and later read back.
    pub extract_dir: PathBuf,

    /// Path of the target JSON schema.
    pub schema_path: PathBuf,

    /// Directory where transformed outputs are written.
    pub transform_dir: PathBuf,

    /// Rendering DPI. Range: 72–400. Default: 200.
    ///
    /// Scanned clinical notes often carry handwriting and small print; 200 DPI
    /// keeps them legible to the vision model.
    pub dpi: u32,

    /// Maximum rendered width or height in pixels. Default: 4000.
    ///
    /// Only oversized pages (posters, plotter output) hit this cap; a letter
    /// page at 200 DPI is 1700 × 2200 px.
    pub max_rendered_pixels: u32,

    /// Explicit path to the pdfium shared library (file or directory).
    /// Falls back to `PDFIUM_LIB_PATH`, then `./`, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Model for the page extractor. If None, uses the provider default.
    pub extraction_model: Option<String>,

    /// Model for the schema transformer. If None, uses the provider default.
    pub transformation_model: Option<String>,

    /// How extraction reports are split into transformer calls.
    pub transform_unit: TransformUnit,

    /// Credential and endpoint for the hosted model.
    /// If None along with `provider`, resolved via [`ProviderConfig::from_env`].
    pub provider_config: Option<ProviderConfig>,

    /// Pre-constructed provider. Takes precedence over `provider_config`.
    pub provider: Option<Arc<dyn ChatProvider>>,

    /// Pre-constructed renderer. Defaults to the pdfium renderer.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Receives per-file and per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            extract_dir: PathBuf::from(DEFAULT_EXTRACT_DIR),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            transform_dir: PathBuf::from(DEFAULT_TRANSFORM_DIR),
            dpi: DEFAULT_DPI,
            max_rendered_pixels: 4000,
            pdfium_library_path: None,
            extraction_model: None,
            transformation_model: None,
            transform_unit: TransformUnit::default(),
            provider_config: None,
            provider: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("extract_dir", &self.extract_dir)
            .field("schema_path", &self.schema_path)
            .field("transform_dir", &self.transform_dir)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("extraction_model", &self.extraction_model)
            .field("transformation_model", &self.transformation_model)
            .field("transform_unit", &self.transform_unit)
            .field("provider_config", &self.provider_config)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PageRenderer>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn extract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.extract_dir = dir.into();
        self
    }

    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schema_path = path.into();
        self
    }

    pub fn transform_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.transform_dir = dir.into();
        self
    }

    /// Unlike the other setters this does not clamp; out-of-range values are
    /// rejected by [`build`](Self::build).
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Use the same model for both stages.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.config.extraction_model = Some(model.clone());
        self.config.transformation_model = Some(model);
        self
    }

    pub fn extraction_model(mut self, model: impl Into<String>) -> Self {
        self.config.extraction_model = Some(model.into());
        self
    }

    pub fn transformation_model(mut self, model: impl Into<String>) -> Self {
        self.config.transformation_model = Some(model.into());
        self
    }

    pub fn transform_unit(mut self, unit: TransformUnit) -> Self {
        self.config.transform_unit = unit;
        self
    }

    pub fn provider_config(mut self, provider_config: ProviderConfig) -> Self {
        self.config.provider_config = Some(provider_config);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Use any `edgequake-llm` provider for both stages.
    pub fn llm_provider(self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider(Arc::new(LlmChatProvider::new(provider)))
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, MedExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(MedExtractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        for (name, path) in [
            ("input_dir", &c.input_dir),
            ("extract_dir", &c.extract_dir),
            ("schema_path", &c.schema_path),
            ("transform_dir", &c.transform_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(MedExtractError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Provider selection ───────────────────────────────────────────────────

/// Hosted chat-completion services with an OpenAI-compatible API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI, default model `gpt-4o`.
    OpenAi,
    /// Groq, default model Llama 4 Maverick.
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Groq];

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
        }
    }

    /// Environment variable holding the API key.
    pub fn credential_var(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Groq => "meta-llama/llama-4-maverick-17b-128e-instruct",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = MedExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            other => Err(MedExtractError::UnknownProvider {
                name: other.to_string(),
            }),
        }
    }
}

/// Credential and endpoint for a hosted provider.
///
/// The key itself is never held here: the HTTP client reads it from
/// `credential_var` when the provider is built.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Environment variable holding the API key.
    pub credential_var: String,
    /// Base URL ending before `/chat/completions`.
    pub base_url: String,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            credential_var: kind.credential_var().to_string(),
            base_url: kind.default_base_url().to_string(),
        }
    }

    /// Point the provider at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Read the key from another variable, e.g. for a self-hosted endpoint.
    pub fn with_credential_var(mut self, var: impl Into<String>) -> Self {
        self.credential_var = var.into();
        self
    }

    /// Pick the provider whose credential is set in the process environment.
    ///
    /// With an explicit `kind`, only that provider's variable is consulted.
    /// Otherwise `OPENAI_API_KEY` wins over `GROQ_API_KEY`. Empty values
    /// count as unset.
    pub fn from_env(kind: Option<ProviderKind>) -> Result<Self, MedExtractError> {
        Self::from_lookup(kind, |var| std::env::var(var).ok())
    }

    fn from_lookup(
        kind: Option<ProviderKind>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MedExtractError> {
        let is_set = |k: ProviderKind| {
            lookup(k.credential_var()).is_some_and(|v| !v.trim().is_empty())
        };

        match kind {
            Some(k) if is_set(k) => Ok(Self::new(k)),
            Some(k) => Err(MedExtractError::MissingCredential {
                var: k.credential_var().to_string(),
            }),
            None => ProviderKind::ALL
                .iter()
                .find(|&&k| is_set(k))
                .map(|&k| Self::new(k))
                .ok_or_else(|| MedExtractError::MissingCredential {
                    var: format!(
                        "{} (or {})",
                        ProviderKind::OpenAi.credential_var(),
                        ProviderKind::Groq.credential_var()
                    ),
                }),
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How an extraction report is split into transformer calls.
///
/// | Unit | Calls per file | Output shape |
/// |------|----------------|--------------|
/// | `Report` | 1 | whatever the model returns for the whole page list |
/// | `PerRecord` | one per page | JSON array, one reply per page |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformUnit {
    /// Send the whole page list in one call. (default)
    #[default]
    Report,
    /// Send each page record separately.
    PerRecord,
}

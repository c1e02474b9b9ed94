//! Error types for the medchart-extract library.
//!
//! Every failure is fatal to the operation that raised it and is returned as
//! [`MedExtractError`]. The variants fall into four groups:
//!
//! * **Configuration**: missing credential, bad builder input, unreadable
//!   or malformed schema. These surface before any remote call is made.
//! * **Document**: the PDF cannot be opened or rasterised. The extraction
//!   driver treats these as per-file failures (see
//!   [`MedExtractError::is_document_error`]) and moves on to the next file.
//! * **Remote**: the hosted model rejected the request or replied with
//!   something that is not JSON. Nothing is retried; these halt the run.
//! * **Output**: the report could not be written.

use edgequake_llm::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the medchart-extract library.
#[derive(Debug, Error)]
pub enum MedExtractError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API credential was found in the process environment.
    #[error(
        "Missing API credential: environment variable {var} is not set.\n\
         Export it before running, e.g. export {var}=..."
    )]
    MissingCredential { var: String },

    /// The provider name is not one of the supported presets.
    #[error("Unknown provider '{name}'. Supported providers: openai, groq")]
    UnknownProvider { name: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The target schema file could not be read.
    #[error("Cannot read schema file '{path}': {source}")]
    SchemaUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target schema file is not valid JSON.
    #[error("Schema file '{path}' is not valid JSON: {source}")]
    SchemaInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// A directory that should be listed could not be read.
    #[error("Cannot list directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium could not parse the document.
    #[error("PDF '{path}' is corrupt or encrypted: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page} of '{path}': {detail}")]
    RasterisationFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// The rendered bitmap could not be PNG-encoded.
    #[error("PNG encoding failed for page {page}: {detail}")]
    ImageEncodingFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Rendering needs the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or containing directory).\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    /// An `*_extracted.json` file could not be read or parsed.
    #[error("Cannot load extraction file '{path}': {detail}")]
    ExtractionUnreadable { path: PathBuf, detail: String },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The request never got an HTTP response (connect failure, timeout).
    #[error("Request to provider '{provider}' failed: {detail}")]
    Http { provider: String, detail: String },

    /// The provider rejected the credential (HTTP 401/403).
    #[error(
        "Authentication error from provider '{provider}': {detail}\n\
         Check the API key variable."
    )]
    AuthError { provider: String, detail: String },

    /// The provider returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}': {detail}")]
    RateLimitExceeded { provider: String, detail: String },

    /// Any other failure reported by the provider.
    #[error("LLM API error from '{provider}'{}: {message}", status_hint(.status))]
    LlmApiError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The provider answered without any message content.
    #[error("Provider '{provider}' returned an empty reply")]
    EmptyReply { provider: String },

    /// The model reply could not be parsed as JSON.
    #[error("Model reply for {context} is not valid JSON: {detail}")]
    MalformedReply { context: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_hint(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

/// OpenAI-compatible providers report HTTP failures as
/// `ApiError("<name> API 401: ...")` or `ApiError("<name> API error 500: ...")`.
static RE_API_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bAPI (?:error )?(\d{3})\b").unwrap());

impl MedExtractError {
    /// Map an `edgequake-llm` error from `provider` onto the remote group.
    ///
    /// Status codes embedded in `ApiError` text are recovered so that 401/403
    /// and 429 surface as [`AuthError`](Self::AuthError) and
    /// [`RateLimitExceeded`](Self::RateLimitExceeded).
    pub fn from_llm(provider: &str, err: LlmError) -> Self {
        let provider = provider.to_string();
        match err {
            LlmError::AuthError(detail) => MedExtractError::AuthError { provider, detail },
            LlmError::RateLimited(detail) => {
                MedExtractError::RateLimitExceeded { provider, detail }
            }
            LlmError::NetworkError(detail) => MedExtractError::Http { provider, detail },
            LlmError::Timeout => MedExtractError::Http {
                provider,
                detail: "request timed out".to_string(),
            },
            LlmError::ConfigError(detail) => MedExtractError::InvalidConfig(detail),
            LlmError::ApiError(message) => {
                let status = RE_API_STATUS
                    .captures(&message)
                    .and_then(|c| c[1].parse::<u16>().ok());
                match status {
                    Some(401) | Some(403) => MedExtractError::AuthError {
                        provider,
                        detail: message,
                    },
                    Some(429) => MedExtractError::RateLimitExceeded {
                        provider,
                        detail: message,
                    },
                    _ => MedExtractError::LlmApiError {
                        provider,
                        status,
                        message,
                    },
                }
            }
            other => MedExtractError::LlmApiError {
                provider,
                status: None,
                message: other.to_string(),
            },
        }
    }

    /// Whether this error concerns a single PDF that could not be opened or
    /// rendered. The extraction driver skips such files instead of halting.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            MedExtractError::FileNotFound { .. }
                | MedExtractError::PermissionDenied { .. }
                | MedExtractError::NotAPdf { .. }
                | MedExtractError::CorruptPdf { .. }
                | MedExtractError::RasterisationFailed { .. }
                | MedExtractError::ImageEncodingFailed { .. }
        )
    }
}

//! Data produced and consumed by the pipeline.
//!
//! Reports hold the model's JSON exactly as returned. The typed
//! [`ExtractionRecord`] view is lenient: a page the model filled only partly
//! still deserialises, with absent fields left empty.

use crate::error::MedExtractError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

// ── Extraction ───────────────────────────────────────────────────────────

/// Clinical fields for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRecord {
    pub medical_diagnosis: Vec<String>,
    pub surgical_history: Vec<String>,
    pub allergies: Allergies,
    pub physical_examination: PhysicalExamination,
}

impl ExtractionRecord {
    /// One-line digest for logs, e.g.
    /// `2 diagnoses, 1 surgeries, allergies: penicillin, health: fair`.
    pub fn summary(&self) -> String {
        let allergies = if self.allergies.allergy_list.is_empty() {
            if self.allergies.has_allergies {
                "yes".to_string()
            } else {
                "none".to_string()
            }
        } else {
            self.allergies.allergy_list.join("; ")
        };
        let health = match self.physical_examination.overall_health {
            Some(h) => h.as_str(),
            None => "n/a",
        };
        format!(
            "{} diagnoses, {} surgeries, allergies: {}, health: {}",
            self.medical_diagnosis.len(),
            self.surgical_history.len(),
            allergies,
            health
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allergies {
    pub has_allergies: bool,
    pub allergy_list: Vec<String>,
}

/// Vital signs are kept as free text ("5'7\"", "120/80") the way the note
/// records them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalExamination {
    pub height: Option<String>,
    pub weight: Option<String>,
    pub blood_pressure: Option<String>,
    pub pulse: Option<String>,
    pub respiratory_rate: Option<String>,
    pub temperature: Option<String>,
    pub overall_health: Option<OverallHealth>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Good,
    Fair,
    Poor,
}

impl OverallHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallHealth::Good => "good",
            OverallHealth::Fair => "fair",
            OverallHealth::Poor => "poor",
        }
    }
}

/// One entry per PDF page, in page order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionReport {
    pub pages: Vec<Value>,
}

impl ExtractionReport {
    pub fn new(pages: Vec<Value>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Typed view of every page. A page whose JSON does not fit the record
    /// shape (wrong types, not an object) yields `Err` for that page only.
    pub fn typed_records(&self) -> Vec<Result<ExtractionRecord, serde_json::Error>> {
        self.pages
            .iter()
            .map(|v| ExtractionRecord::deserialize(v))
            .collect()
    }
}

// ── Transformation ───────────────────────────────────────────────────────

/// A JSON Schema document, passed to the model verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSchema(Value);

impl TargetSchema {
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Read and parse the schema file.
    pub fn load(path: &Path) -> Result<Self, MedExtractError> {
        let text = std::fs::read_to_string(path).map_err(|e| MedExtractError::SchemaUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let value = serde_json::from_str(&text).map_err(|e| MedExtractError::SchemaInvalid {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

// ── Run summaries ────────────────────────────────────────────────────────

/// One PDF that was reported.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub page_count: usize,
}

/// One PDF that could not be opened or rendered.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub extracted: Vec<ExtractedFile>,
    pub skipped: Vec<SkippedFile>,
    pub total_pages: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TransformedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Remote calls made for this file (1 in report mode).
    pub calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TransformSummary {
    pub transformed: Vec<TransformedFile>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub extraction: ExtractionSummary,
    pub transformation: TransformSummary,
}

// ── Writing ──────────────────────────────────────────────────────────────

/// Write `value` as pretty JSON to `dir/file_name`, creating `dir` if needed.
///
/// The file is written to a temp file in the same directory and then
/// renamed over the target, so readers never observe a half-written report.
pub fn write_json_atomic(
    dir: &Path,
    file_name: &str,
    value: &impl Serialize,
) -> Result<PathBuf, MedExtractError> {
    let path = dir.join(file_name);
    let write_err = |source: std::io::Error| MedExtractError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| MedExtractError::Internal(format!("JSON serialisation failed: {e}")))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    Ok(path)
}

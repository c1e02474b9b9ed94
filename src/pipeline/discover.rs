//! Input discovery and output naming.
//!
//! Both drivers read their directory listing once, non-recursively, and
//! process entries in file-name order so that repeated runs touch files in
//! the same sequence.

use crate::error::MedExtractError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to a PDF's stem for its extraction report.
pub const EXTRACTED_SUFFIX: &str = "_extracted.json";
/// Prefix prepended to an extraction report's file name for its transformed output.
pub const TRANSFORMED_PREFIX: &str = "transformed_";

/// List regular files in `dir` whose names satisfy `keep`, sorted by name.
fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, MedExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|e| MedExtractError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MedExtractError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let keep_it = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| keep(n));
        if keep_it {
            files.push(path);
        }
    }
    files.sort();
    debug!("{}: {} matching files", dir.display(), files.len());
    Ok(files)
}

/// `*.pdf` files (extension matched case-insensitively).
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, MedExtractError> {
    list_files(dir, |name| name.to_lowercase().ends_with(".pdf"))
}

/// `*_extracted.json` files.
pub fn discover_extractions(dir: &Path) -> Result<Vec<PathBuf>, MedExtractError> {
    list_files(dir, |name| name.ends_with(EXTRACTED_SUFFIX))
}

/// `X.pdf` → `X_extracted.json`
pub fn extraction_file_name(pdf_path: &Path) -> String {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}{EXTRACTED_SUFFIX}")
}

/// `X_extracted.json` → `transformed_X_extracted.json`
pub fn transformed_file_name(extraction_path: &Path) -> String {
    let name = extraction_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{TRANSFORMED_PREFIX}{name}")
}

/// File name for logs and progress messages.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

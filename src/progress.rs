//! Progress-callback trait for per-file and per-page pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the drivers work through each directory. The CLI forwards them
//! to an `indicatif` bar; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use medchart_extract::{PipelineConfig, PipelineProgress};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl PipelineProgress for PageCounter {
//!     fn on_page_complete(&self, _file: &str, _page_num: usize, _total_pages: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the drivers as they process each file.
///
/// Files and pages are processed one at a time, so events for a run arrive
/// in order. All methods default to no-ops.
pub trait PipelineProgress: Send + Sync {
    /// Before the first PDF is opened.
    fn on_extraction_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// A PDF was rendered and its pages are about to be sent.
    fn on_file_start(&self, file: &str, total_pages: usize) {
        let _ = (file, total_pages);
    }

    /// One page's reply was received and parsed. `page_num` is 1-indexed.
    fn on_page_complete(&self, file: &str, page_num: usize, total_pages: usize) {
        let _ = (file, page_num, total_pages);
    }

    /// A PDF's report was written.
    fn on_file_complete(&self, file: &str, output: &Path) {
        let _ = (file, output);
    }

    /// A PDF could not be opened or rendered and was left out.
    fn on_file_skipped(&self, file: &str, error: &str) {
        let _ = (file, error);
    }

    /// Before the first extraction report is transformed.
    fn on_transform_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// A transformed output was written.
    fn on_transform_file_complete(&self, file: &str, output: &Path) {
        let _ = (file, output);
    }
}

/// Used when no callback is configured.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgress>;

//! Pipeline stages for extraction and transformation.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the renderer or provider can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ render ──▶ encode ──▶ llm::extract_page ──▶ reply ──▶ report
//! (*.pdf)      (pdfium)   (base64)   (vision model)        (JSON)
//!
//! discover ──▶ llm::transform_record ──▶ reply ──▶ transformed output
//! (*_extracted.json)  (text model + schema)
//! ```
//!
//! 1. [`discover`] lists inputs and derives output file names
//! 2. [`render`] rasterises every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`] PNG-encodes and base64-wraps each page
//! 4. [`llm`] builds the two request kinds; the only stage with network I/O
//! 5. [`reply`] strips stray fences and parses the reply as JSON

pub mod discover;
pub mod encode;
pub mod llm;
pub mod render;
pub mod reply;

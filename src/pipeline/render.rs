//! PDF rasterisation: render every page to a base64 PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. `tokio::task::spawn_blocking` moves the work onto
//! the blocking pool so the runtime worker never stalls mid-render.
//!
//! ## Scale, not target width
//!
//! Pages are scaled by `dpi / 72` (PDF user space is 72 units per inch), so
//! a 200 DPI render of a letter page is 1700 × 2200 px. `max_rendered_pixels`
//! only caps pathological page sizes.

use crate::config::PipelineConfig;
use crate::error::MedExtractError;
use crate::pipeline::encode::{encode_page, PageImage};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a PDF on disk into one encoded image per page, in page order.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, pdf_path: &Path) -> Result<Vec<PageImage>, MedExtractError>;
}

/// [`PageRenderer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    dpi: u32,
    max_rendered_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(dpi: u32, max_rendered_pixels: u32) -> Self {
        Self {
            dpi,
            max_rendered_pixels,
            library_path: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            library_path: config.pdfium_library_path.clone(),
        }
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    async fn render(&self, pdf_path: &Path) -> Result<Vec<PageImage>, MedExtractError> {
        check_pdf_file(pdf_path)?;

        let path = pdf_path.to_path_buf();
        let renderer = self.clone();

        tokio::task::spawn_blocking(move || renderer.render_blocking(&path))
            .await
            .map_err(|e| MedExtractError::Internal(format!("Render task panicked: {}", e)))?
    }
}

impl PdfiumRenderer {
    fn render_blocking(&self, pdf_path: &Path) -> Result<Vec<PageImage>, MedExtractError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| MedExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("{}: {} pages", pdf_path.display(), total_pages);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let mut images = Vec::with_capacity(total_pages);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                MedExtractError::RasterisationFailed {
                    path: pdf_path.to_path_buf(),
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            let encoded = encode_page(page_num, &image).map_err(|e| {
                MedExtractError::ImageEncodingFailed {
                    page: page_num,
                    detail: e.to_string(),
                }
            })?;
            images.push(encoded);
        }

        Ok(images)
    }
}

/// Validate existence, read permission and `%PDF` magic before pdfium sees
/// the file, so callers get a meaningful error rather than a pdfium code.
fn check_pdf_file(path: &Path) -> Result<(), MedExtractError> {
    if !path.exists() {
        return Err(MedExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => Ok(()),
                Ok(()) => Err(MedExtractError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                }),
                Err(e) => Err(MedExtractError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: format!("too short to be a PDF: {e}"),
                }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(MedExtractError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(MedExtractError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then `./`, then
/// the system library.
///
/// A path may name the library file itself or the directory containing it.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, MedExtractError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let configured = explicit.map(Path::to_path_buf).or(env_path);

    let bindings = match configured {
        Some(path) => {
            let lib = if path.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                path.clone()
            };
            Pdfium::bind_to_library(&lib).map_err(|e| {
                MedExtractError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e))
            })?
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| MedExtractError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = check_pdf_file(&dir.path().join("nope.pdf")).unwrap_err();
        assert!(matches!(err, MedExtractError::FileNotFound { .. }));
        assert!(err.is_document_error());
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"PK\x03\x04zip really")
            .unwrap();
        match check_pdf_file(&path).unwrap_err() {
            MedExtractError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            check_pdf_file(&path).unwrap_err(),
            MedExtractError::CorruptPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_passes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        assert!(check_pdf_file(&path).is_ok());
    }

    #[tokio::test]
    async fn render_rejects_non_pdf_before_binding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();
        let renderer = PdfiumRenderer::new(200, 4000).with_library_path(dir.path());
        let err = renderer.render(&path).await.unwrap_err();
        assert!(matches!(err, MedExtractError::NotAPdf { .. }));
    }
}

//! Image encoding: `DynamicImage` → base64 PNG wrapped in [`PageImage`].
//!
//! Chat-completion APIs accept images as base64 data URIs embedded in the
//! JSON request body. PNG is lossless, so handwriting and fine print on a
//! scanned note reach the model without compression artefacts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// One rendered page, encoded for embedding in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Base64 (standard alphabet, padded) of the PNG bytes.
    pub data: String,
    pub mime_type: &'static str,
}

impl PageImage {
    pub fn png(page_num: usize, data: impl Into<String>) -> Self {
        Self {
            page_num,
            data: data.into(),
            mime_type: "image/png",
        }
    }

    /// Request-ready image at `detail: high`, so small print is not downscaled.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(&self.data, self.mime_type).with_detail("high")
    }
}

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", page_num, b64.len());

    Ok(PageImage::png(page_num, b64))
}

// src/ai/encoder.rs
use base64::{Engine as _, engine::general_purpose};
use image::ImageFormat;
use log::debug;
use std::path::Path;

use super::connector::SolveError;

/// Base64 text of an image file plus the MIME type it is sent as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// `data:<mime>;base64,<data>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Guess the MIME type from the file extension. Unknown or missing
/// extensions are sent as PNG, which is what the canvas writes.
pub fn mime_type_for(path: &Path) -> &'static str {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        _ => "image/png",
    }
}

pub fn read_image(path: &Path) -> Result<Vec<u8>, SolveError> {
    std::fs::read(path).map_err(|e| SolveError::ImageRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Read the file and base64 it. No size or format checks.
pub fn encode_image(path: &Path) -> Result<EncodedImage, SolveError> {
    let bytes = read_image(path)?;
    debug!("Encoding {} ({} bytes)", path.display(), bytes.len());

    Ok(EncodedImage {
        data: general_purpose::STANDARD.encode(&bytes),
        mime_type: mime_type_for(path),
    })
}

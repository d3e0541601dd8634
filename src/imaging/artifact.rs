// artifact.rs — Turns a base64 artifact from the image queue into raw bytes
// and probes its header (format, dimensions) with the `image` crate.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use crate::ai::AiError;

/// A decoded generated image, ready to be displayed or saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Raw decoded bytes, exactly as produced by the service.
    pub bytes: Vec<u8>,
    /// Container format when the header is recognised.
    pub format: Option<ImageFormat>,
    /// Pixel dimensions when the header could be read.
    pub dimensions: Option<(u32, u32)>,
}

impl GeneratedImage {
    /// Preferred file extension for saving, `png` when unknown.
    pub fn extension(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png")
    }

    /// One-line human summary, e.g. `1024x1024 Png, 183204 bytes`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some((w, h)) = self.dimensions {
            parts.push(format!("{w}x{h}"));
        }
        if let Some(format) = self.format {
            parts.push(format!("{format:?}"));
        }
        let head = if parts.is_empty() {
            "image".to_string()
        } else {
            parts.join(" ")
        };
        format!("{head}, {} bytes", self.bytes.len())
    }
}

/// Decode one base64 artifact. Only invalid base64 is an error; an
/// unrecognised image header just leaves `format`/`dimensions` empty.
pub fn decode_artifact(encoded: &str) -> Result<GeneratedImage, AiError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| AiError::InvalidResponse(format!("artifact is not valid base64: {e}")))?;

    let format = image::guess_format(&bytes).ok();
    let dimensions = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    Ok(GeneratedImage {
        bytes,
        format,
        dimensions,
    })
}

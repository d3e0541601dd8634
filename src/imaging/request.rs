use crate::ai::AiError;

/// Resolutions offered by the image window; used when strict mode is on.
pub const ALLOWED_RESOLUTIONS: [u32; 12] =
    [144, 240, 360, 480, 512, 720, 1024, 1280, 1366, 1440, 1920, 2560];

pub const DEFAULT_RESOLUTION: u32 = 1024;

/// An immutable, validated text-to-image request.
///
/// The model selector is not part of the request: it is resolved by the
/// [`JobSubmitter`](super::JobSubmitter) at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    width: u32,
    height: u32,
}

impl GenerationRequest {
    /// Validate and build a request.
    ///
    /// With `strict` set, both dimensions must be in [`ALLOWED_RESOLUTIONS`];
    /// otherwise any positive value is accepted.
    pub fn new(prompt: &str, width: u32, height: u32, strict: bool) -> Result<Self, AiError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AiError::InvalidRequest("prompt is empty".into()));
        }
        for (axis, value) in [("width", width), ("height", height)] {
            if value == 0 {
                return Err(AiError::InvalidRequest(format!("{axis} must be positive")));
            }
            if strict && !is_allowed_resolution(value) {
                return Err(AiError::InvalidRequest(format!(
                    "{axis} {value} is not one of {:?}",
                    ALLOWED_RESOLUTIONS
                )));
            }
        }
        Ok(Self {
            prompt: prompt.to_string(),
            width,
            height,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

pub fn is_allowed_resolution(value: u32) -> bool {
    ALLOWED_RESOLUTIONS.contains(&value)
}

/// Parse `WIDTHxHEIGHT` (either `x` or `X`).
pub fn parse_dimensions(token: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("invalid size {token:?}, expected WIDTHxHEIGHT");
    let (w, h) = token.split_once(['x', 'X']).ok_or_else(invalid)?;
    let w = w.trim().parse().map_err(|_| invalid())?;
    let h = h.trim().parse().map_err(|_| invalid())?;
    Ok((w, h))
}

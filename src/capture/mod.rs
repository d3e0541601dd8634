/// The `capture` module turns speech into a WAV clip for transcription.
/// Live microphone recording needs the `microphone` feature (cpal); the PCM
/// and WAV helpers are always available.
pub mod pcm;

use crate::ai::AiError;

#[cfg(feature = "microphone")]
pub mod microphone;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No default input device found")]
    NoDevice,
    #[error("Audio device error: {0}")]
    Device(String),
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("Recording was silent")]
    Silent,
    #[error("Microphone capture not available in this build (enable the `microphone` feature)")]
    Unavailable,
    #[error("Failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CaptureError> for AiError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Silent => AiError::NoSpeech,
            other => AiError::InvalidRequest(format!("audio capture failed: {other}")),
        }
    }
}

/// Record a clip of `seconds` from the default microphone as WAV bytes.
/// Blocking; call from `spawn_blocking`.
pub fn record_clip(seconds: u32) -> Result<Vec<u8>, CaptureError> {
    #[cfg(feature = "microphone")]
    {
        microphone::record_wav(seconds)
    }
    #[cfg(not(feature = "microphone"))]
    {
        let _ = seconds;
        Err(CaptureError::Unavailable)
    }
}

/// Load a pre-recorded WAV clip from disk.
pub fn load_clip(path: &std::path::Path) -> Result<Vec<u8>, CaptureError> {
    Ok(std::fs::read(path)?)
}

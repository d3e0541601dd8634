//! Mock service implementations shared by the integration tests.
//! Fully deterministic: no network, no audio hardware.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chatdesk_lib::ai::{
    AiError, ChatMessage, ChatProvider, ImageQueue, JobHandle, JobStatus, SpeechRecognizer,
};
use chatdesk_lib::imaging::GenerationRequest;
use image::{ImageBuffer, ImageFormat, Rgb};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Image queue
// ---------------------------------------------------------------------------

/// One scripted answer to a status check.
#[derive(Debug, Clone)]
pub enum Step {
    Pending,
    Done(Vec<String>),
    Failed(String),
    Transport(String),
    /// A non-transport error from the status call.
    Fatal(String),
}

impl Step {
    fn into_result(self) -> Result<JobStatus, AiError> {
        match self {
            Step::Pending => Ok(JobStatus::Pending),
            Step::Done(images) => Ok(JobStatus::Done(images)),
            Step::Failed(reason) => Ok(JobStatus::Failed(reason)),
            Step::Transport(msg) => Err(AiError::ConnectionError(msg)),
            Step::Fatal(msg) => Err(AiError::Poll(msg)),
        }
    }
}

/// Image queue that answers status checks from a script. Once the script
/// runs out every further check reports `Pending`.
pub struct ScriptedQueue {
    models: Mutex<Result<Vec<String>, String>>,
    submit_error: Mutex<Option<String>>,
    steps: Mutex<VecDeque<Step>>,
    pub list_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub submitted_models: Mutex<Vec<String>>,
    pub status_times: Mutex<Vec<Instant>>,
    /// Delay applied inside every status check.
    pub status_latency: Duration,
}

impl ScriptedQueue {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            models: Mutex::new(Ok(vec!["4".into(), "7".into()])),
            submit_error: Mutex::new(None),
            steps: Mutex::new(steps.into()),
            list_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            submitted_models: Mutex::new(Vec::new()),
            status_times: Mutex::new(Vec::new()),
            status_latency: Duration::ZERO,
        }
    }

    pub fn with_models(self, models: Result<Vec<String>, String>) -> Self {
        *self.models.lock().unwrap() = models;
        self
    }

    pub fn with_submit_error(self, msg: &str) -> Self {
        *self.submit_error.lock().unwrap() = Some(msg.to_string());
        self
    }

    pub fn with_status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = latency;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_times.lock().unwrap().len()
    }

    pub fn status_times(&self) -> Vec<Instant> {
        self.status_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageQueue for ScriptedQueue {
    async fn list_models(&self) -> Result<Vec<String>, AiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.models
            .lock()
            .unwrap()
            .clone()
            .map_err(AiError::ConnectionError)
    }

    async fn submit(
        &self,
        model_id: &str,
        _request: &GenerationRequest,
    ) -> Result<JobHandle, AiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_models
            .lock()
            .unwrap()
            .push(model_id.to_string());
        if let Some(msg) = self.submit_error.lock().unwrap().clone() {
            return Err(AiError::ConnectionError(msg));
        }
        Ok(JobHandle::new("job-1"))
    }

    async fn status(&self, _handle: &JobHandle) -> Result<JobStatus, AiError> {
        self.status_times.lock().unwrap().push(Instant::now());
        if !self.status_latency.is_zero() {
            tokio::time::sleep(self.status_latency).await;
        }
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Pending);
        step.into_result()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Chat provider that echoes the last message and records every request.
pub struct EchoChat {
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    pub latency: Duration,
    pub fail_with: Option<String>,
}

impl EchoChat {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            fail_with: None,
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for EchoChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(msg) = &self.fail_with {
            return Err(AiError::Completion(msg.clone()));
        }
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("echo: {last}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// Speech recognizer returning a canned transcript (or `NoSpeech` when
/// `None`).
pub struct CannedSpeech {
    pub transcript: Option<String>,
    pub languages: Mutex<Vec<String>>,
}

impl CannedSpeech {
    pub fn new(transcript: Option<&str>) -> Self {
        Self {
            transcript: transcript.map(str::to_string),
            languages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CannedSpeech {
    async fn transcribe(&self, _wav: &[u8], language: &str) -> Result<String, AiError> {
        self.languages.lock().unwrap().push(language.to_string());
        self.transcript.clone().ok_or(AiError::NoSpeech)
    }

    fn name(&self) -> &str {
        "canned"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A base64-encoded 3x2 PNG, as the queue would return it.
pub fn tiny_png_base64() -> String {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(3, 2, Rgb([10, 200, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    BASE64.encode(out.into_inner())
}

pub fn request() -> GenerationRequest {
    GenerationRequest::new("a lighthouse at dusk", 1024, 1024, true).unwrap()
}

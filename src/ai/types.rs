use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Value stored in the database and sent to the chat API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label used when rendering or exporting a conversation.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
}

impl ConversationEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A message as sent to the chat-completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ConversationEntry> for ChatMessage {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.text.clone(),
        }
    }
}

/// Opaque identifier of a job accepted by the image queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a queued image job, as reported by one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    /// Finished; carries base64-encoded artifacts.
    Done(Vec<String>),
    Failed(String),
}

impl JobStatus {
    /// Map a wire status plus its artifact list to a `JobStatus`.
    /// Unknown statuses are treated as still pending.
    pub fn from_wire(status: &str, images: Option<Vec<String>>, detail: Option<String>) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "DONE" => JobStatus::Done(images.unwrap_or_default()),
            "FAIL" | "FAILED" => {
                JobStatus::Failed(detail.unwrap_or_else(|| "generation failed".into()))
            }
            _ => JobStatus::Pending,
        }
    }
}

/// Error type for every remote operation (chat, speech, image queue).
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Could not resolve a generation model: {0}")]
    ModelResolution(String),
    #[error("Generation request rejected: {0}")]
    Submission(String),
    #[error("Image was not ready after {attempts} status checks")]
    PollTimeout { attempts: u32 },
    #[error("Status check failed: {0}")]
    Poll(String),
    #[error("No speech was recognized")]
    NoSpeech,
    #[error("Speech recognition service error: {0}")]
    Transcription(String),
    #[error("Chat completion failed: {0}")]
    Completion(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Cancelled")]
    Cancelled,
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl AiError {
    /// Transport-level failures: the call never produced a usable answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AiError::ConnectionError(_) | AiError::AuthError(_) | AiError::InvalidResponse(_)
        )
    }
}

// shell/mod.rs — The interactive UI context.
//
// A single-threaded loop that reads commands, spawns network-bound work
// through the `TaskRunner`, and applies each worker's outcome when it
// arrives. It is the only reader and writer of the conversation store.

use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::ai::{AiError, ChatMessage, ChatProvider, ConversationEntry, ImageQueue, Role, SpeechRecognizer};
use crate::capture;
use crate::export;
use crate::imaging::{generate_image, GeneratedImage, GenerationRequest};
use crate::settings::Settings;
use crate::store::{ConversationStore, StoreError};
use crate::tasks::TaskRunner;

pub mod commands;

use commands::{Command, HELP};

/// Outcome of one unit of work, delivered to the shell exactly once.
#[derive(Debug)]
pub enum ShellMessage {
    ChatReply {
        conversation: String,
        result: Result<String, AiError>,
    },
    Transcribed(Result<String, AiError>),
    ImageReady {
        prompt: String,
        result: Result<GeneratedImage, AiError>,
    },
}

/// The remote services the shell dispatches to.
#[derive(Clone)]
pub struct Services {
    pub chat: Arc<dyn ChatProvider>,
    pub speech: Arc<dyn SpeechRecognizer>,
    pub images: Arc<dyn ImageQueue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<W: Write> {
    store: ConversationStore,
    services: Services,
    settings: Settings,
    runner: TaskRunner<ShellMessage>,
    out: W,
    current: Option<String>,
    last_image: Option<GeneratedImage>,
    /// Units spawned whose message has not been handled yet.
    pending: usize,
}

impl<W: Write> Shell<W> {
    pub fn new(
        store: ConversationStore,
        services: Services,
        settings: Settings,
        out: W,
    ) -> (Self, mpsc::UnboundedReceiver<ShellMessage>) {
        let (runner, rx) = TaskRunner::new();
        let shell = Self {
            store,
            services,
            settings,
            runner,
            out,
            current: None,
            last_image: None,
            pending: 0,
        };
        (shell, rx)
    }

    pub fn current_conversation(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn last_image(&self) -> Option<&GeneratedImage> {
        self.last_image.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Read commands from `input` until `/quit` or end of input, applying
    /// worker outcomes as they arrive. At end of input, outstanding work is
    /// awaited first so piped sessions see every reply.
    pub async fn run<R>(
        mut self,
        input: R,
        mut rx: mpsc::UnboundedReceiver<ShellMessage>,
    ) -> Result<(), StoreError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let count = self.store.list_conversations()?.len();
        self.say(format!("{count} conversation(s). Type /help for commands."));

        let mut quit = false;
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if self.handle_line(&line) == Flow::Quit {
                            quit = true;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("Shell: failed to read input: {}", e);
                        break;
                    }
                },
                Some(message) = rx.recv() => self.handle_message(message),
            }
        }

        if !quit {
            while self.pending > 0 {
                match rx.recv().await {
                    Some(message) => self.handle_message(message),
                    None => break,
                }
            }
        }

        self.runner.shutdown();
        let Shell { store, .. } = self;
        store.close()
    }

    /// Apply one line of user input.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        let command = match commands::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.say(format!("error: {e}"));
                return Flow::Continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Say(text) => self.send_user_message(&text),
            Command::New(name) => self.create_conversation(&name),
            Command::List => self.list_conversations(),
            Command::Use(name) => self.select_conversation(&name),
            Command::Remove => self.remove_conversation(),
            Command::Clear => self.clear_conversation(),
            Command::Export(path) => self.export_conversation(&path),
            Command::Voice(path) => self.start_voice_input(path),
            Command::Image { size, prompt } => self.start_image_generation(size, &prompt),
            Command::SaveImage(path) => self.save_image(&path),
            Command::Cancel => {
                let count = self.pending;
                self.runner.cancel_all();
                self.say(format!("Cancelling {count} running request(s)."));
            }
            Command::Help => self.say(HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Apply the outcome of one unit of work.
    pub fn handle_message(&mut self, message: ShellMessage) {
        self.pending = self.pending.saturating_sub(1);
        match message {
            ShellMessage::ChatReply {
                conversation,
                result,
            } => self.apply_chat_reply(conversation, result),
            ShellMessage::Transcribed(Ok(text)) => {
                self.say(format!("(voice) {text}"));
                self.send_user_message(&text);
            }
            ShellMessage::Transcribed(Err(AiError::NoSpeech)) => {
                self.say("Could not recognize speech.");
            }
            ShellMessage::Transcribed(Err(e)) => self.say(format!("error: {e}")),
            ShellMessage::ImageReady { prompt, result } => match result {
                Ok(image) => {
                    self.say(format!(
                        "Image ready for {prompt:?}: {}. Save it with /save-image <path>.{}",
                        image.describe(),
                        image.extension()
                    ));
                    self.last_image = Some(image);
                }
                Err(e) => self.say(format!("error: image generation failed: {e}")),
            },
        }
    }

    // ── conversation management ─────────────────────────────────────

    fn create_conversation(&mut self, name: &str) {
        match self.store.create_conversation(name) {
            Ok(()) => {
                let name = name.trim().to_string();
                self.say(format!("Created conversation {name:?}."));
                self.current = Some(name);
            }
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn list_conversations(&mut self) {
        match self.store.list_conversations() {
            Ok(names) if names.is_empty() => self.say("No conversations yet. Create one with /new <name>."),
            Ok(names) => {
                for name in names {
                    let marker = if self.current.as_deref() == Some(name.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    self.say(format!("{marker} {name}"));
                }
            }
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn select_conversation(&mut self, name: &str) {
        match self.store.list_entries(name) {
            Ok(entries) => {
                self.current = Some(name.to_string());
                self.say(format!("── {name} ──"));
                for entry in &entries {
                    self.render_entry(entry);
                }
            }
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn remove_conversation(&mut self) {
        let Some(name) = self.require_current() else { return };
        match self.store.delete_conversation(&name) {
            Ok(()) => {
                self.current = None;
                self.say(format!("Removed conversation {name:?}."));
            }
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn clear_conversation(&mut self) {
        let Some(name) = self.require_current() else { return };
        match self.store.clear_entries(&name) {
            Ok(()) => self.say(format!("Cleared conversation {name:?}.")),
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn export_conversation(&mut self, path: &Path) {
        let Some(name) = self.require_current() else { return };
        let result = self
            .store
            .list_entries(&name)
            .map_err(|e| e.to_string())
            .and_then(|entries| {
                export::export_conversation(&entries, path).map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => self.say(format!("Exported {name:?} to {}.", path.display())),
            Err(e) => self.say(format!("error: export failed: {e}")),
        }
    }

    // ── remote work ─────────────────────────────────────────────────

    fn send_user_message(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let Some(name) = self.require_current() else { return };

        if let Err(e) = self.store.append_entry(&name, Role::User, text) {
            self.say(format!("error: {e}"));
            return;
        }
        self.render_entry(&ConversationEntry::new(Role::User, text));

        let history = match self.chat_history(&name, text) {
            Ok(history) => history,
            Err(e) => {
                self.say(format!("error: {e}"));
                return;
            }
        };

        let chat = Arc::clone(&self.services.chat);
        let conversation = name.clone();
        self.pending += 1;
        self.runner.run(
            "chat",
            move |cancel| async move {
                if cancel.is_cancelled() {
                    return Err(AiError::Cancelled);
                }
                chat.complete(&history).await
            },
            move |_, result| ShellMessage::ChatReply {
                conversation,
                result,
            },
        );
    }

    /// Messages sent with a chat request: the last `contextMessages` stored
    /// entries (the new message included), or just the new message.
    fn chat_history(&mut self, name: &str, text: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let limit = self.settings.chat.context_messages;
        if limit == 0 {
            return Ok(vec![ChatMessage {
                role: Role::User,
                content: text.to_string(),
            }]);
        }
        Ok(self
            .store
            .recent_entries(name, limit)?
            .iter()
            .map(ChatMessage::from)
            .collect())
    }

    fn apply_chat_reply(&mut self, conversation: String, result: Result<String, AiError>) {
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                self.say(format!("error: {e}"));
                return;
            }
        };
        match self.store.append_entry(&conversation, Role::Assistant, &reply) {
            Ok(()) => {
                if self.current.as_deref() == Some(conversation.as_str()) {
                    self.render_entry(&ConversationEntry::new(Role::Assistant, reply));
                } else {
                    self.say(format!("New reply in {conversation:?}."));
                }
            }
            Err(StoreError::NotFound(_)) => {
                self.say(format!(
                    "Reply for removed conversation {conversation:?} was dropped."
                ));
            }
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn start_voice_input(&mut self, path: Option<PathBuf>) {
        if self.require_current().is_none() {
            return;
        }
        let speech = Arc::clone(&self.services.speech);
        let language = self.settings.speech.language.clone();
        let seconds = self.settings.speech.record_seconds;
        match &path {
            Some(p) => self.say(format!("Transcribing {}…", p.display())),
            None => self.say(format!("Listening for {seconds}s…")),
        }

        self.pending += 1;
        self.runner.run(
            "voice",
            move |cancel| async move {
                let clip = match path {
                    Some(path) => capture::load_clip(&path),
                    None => tokio::task::spawn_blocking(move || capture::record_clip(seconds))
                        .await
                        .map_err(|e| AiError::Worker(e.to_string()))?,
                }
                .map_err(AiError::from)?;
                if cancel.is_cancelled() {
                    return Err(AiError::Cancelled);
                }
                speech.transcribe(&clip, &language).await
            },
            |_, result| ShellMessage::Transcribed(result),
        );
    }

    fn start_image_generation(&mut self, size: Option<(u32, u32)>, prompt: &str) {
        let image_settings = self.settings.image.clone();
        let (width, height) = size.unwrap_or((image_settings.width, image_settings.height));
        let request = match GenerationRequest::new(
            prompt,
            width,
            height,
            image_settings.strict_resolutions,
        ) {
            Ok(request) => request,
            Err(e) => {
                self.say(format!("error: {e}"));
                return;
            }
        };
        let policy = image_settings.poll_policy();
        let queue = Arc::clone(&self.services.images);
        let prompt = request.prompt().to_string();
        self.say(format!("Generating {width}x{height} image for {prompt:?}…"));

        self.pending += 1;
        self.runner.run(
            "image",
            move |cancel| generate_image(queue, request, policy, cancel),
            move |_, result| ShellMessage::ImageReady { prompt, result },
        );
    }

    fn save_image(&mut self, path: &Path) {
        let result = self
            .last_image
            .as_ref()
            .map(|image| export::save_image(image, path));
        match result {
            Some(Ok(())) => self.say(format!("Image saved to {}.", path.display())),
            Some(Err(e)) => self.say(format!("error: could not save image: {e}")),
            None => self.say("error: no image has been generated yet"),
        }
    }

    // ── output ──────────────────────────────────────────────────────

    fn require_current(&mut self) -> Option<String> {
        if self.current.is_none() {
            self.say("error: no conversation selected (use /new or /use)");
        }
        self.current.clone()
    }

    fn render_entry(&mut self, entry: &ConversationEntry) {
        self.say(format!("{}: {}", entry.role.label(), entry.text));
    }

    fn say(&mut self, line: impl Display) {
        if let Err(e) = writeln!(self.out, "{line}") {
            log::warn!("Shell: failed to write output: {}", e);
        }
    }
}

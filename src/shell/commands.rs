use std::path::PathBuf;

use crate::imaging::parse_dimensions;

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: send as a chat message to the selected conversation.
    Say(String),
    New(String),
    List,
    Use(String),
    Remove,
    Clear,
    Export(PathBuf),
    /// Transcribe a WAV file, or record from the microphone when `None`.
    Voice(Option<PathBuf>),
    Image {
        size: Option<(u32, u32)>,
        prompt: String,
    },
    SaveImage(PathBuf),
    Cancel,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command /{0} (try /help)")]
    Unknown(String),
    #[error("/{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("Invalid size {0:?}, expected WIDTHxHEIGHT")]
    InvalidSize(String),
}

pub const HELP: &str = "\
Commands:
  /new <name>             create a conversation and switch to it
  /list                   list conversations
  /use <name>             switch conversation and show its history
  /remove                 delete the current conversation
  /clear                  delete the current conversation's messages
  /export <path>          write the current conversation to a text file
  /voice [file.wav]       speak (or transcribe a file) and send the text
  /image [WxH] <prompt>   generate an image
  /save-image <path>      save the last generated image
  /cancel                 cancel all running requests
  /help                   show this help
  /quit                   exit
Anything else is sent as a message to the current conversation.";

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    let required = |command: &'static str, argument: &'static str| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument { command, argument })
        } else {
            Ok(rest.to_string())
        }
    };

    match name.to_ascii_lowercase().as_str() {
        "new" => required("new", "a conversation name").map(Command::New),
        "list" | "ls" => Ok(Command::List),
        "use" => required("use", "a conversation name").map(Command::Use),
        "remove" | "rm" => Ok(Command::Remove),
        "clear" => Ok(Command::Clear),
        "export" => required("export", "a file path").map(|p| Command::Export(p.into())),
        "voice" => Ok(Command::Voice(
            (!rest.is_empty()).then(|| PathBuf::from(rest)),
        )),
        "image" | "img" => parse_image(rest),
        "save-image" | "save" => {
            required("save-image", "a file path").map(|p| Command::SaveImage(p.into()))
        }
        "cancel" => Ok(Command::Cancel),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_image(rest: &str) -> Result<Command, CommandError> {
    let (first, remainder) = match rest.split_once(char::is_whitespace) {
        Some((first, remainder)) => (first, remainder.trim()),
        None => (rest, ""),
    };

    let size = if looks_like_size(first) {
        Some(parse_size(first)?)
    } else {
        None
    };
    let prompt = if size.is_some() { remainder } else { rest };
    if prompt.is_empty() {
        return Err(CommandError::MissingArgument {
            command: "image",
            argument: "a prompt",
        });
    }
    Ok(Command::Image {
        size,
        prompt: prompt.to_string(),
    })
}

fn looks_like_size(token: &str) -> bool {
    token
        .split_once(['x', 'X'])
        .map(|(w, h)| {
            !w.is_empty()
                && !h.is_empty()
                && w.chars().all(|c| c.is_ascii_digit())
                && h.chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false)
}

pub fn parse_size(token: &str) -> Result<(u32, u32), CommandError> {
    parse_dimensions(token).map_err(|_| CommandError::InvalidSize(token.to_string()))
}

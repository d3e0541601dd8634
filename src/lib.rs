pub mod ai;
pub mod capture;
pub mod cli;
pub mod export;
pub mod imaging;
pub mod settings;
pub mod shell;
pub mod store;
pub mod tasks;

use std::path::Path;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use ai::fusion_brain::FusionBrainClient;
use ai::mistral::MistralChatClient;
use ai::whisper::WhisperClient;
use ai::AiError;
use cli::{Args, CliCommand};
use imaging::GenerationRequest;
use settings::{Settings, SettingsError};
use shell::{Services, Shell};
use store::{ConversationStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the HTTP-backed service clients described by `settings`.
pub fn services(settings: &Settings) -> Services {
    let timeout = settings.request_timeout();
    Services {
        chat: Arc::new(MistralChatClient::new(
            settings.chat.endpoint.clone(),
            settings.chat.api_key.clone(),
            settings.chat.model.clone(),
            timeout,
        )),
        speech: Arc::new(WhisperClient::new(
            settings.speech.endpoint.clone(),
            settings.speech.api_key.clone(),
            settings.speech.model.clone(),
            timeout,
        )),
        images: Arc::new(FusionBrainClient::new(
            settings.image.endpoint.clone(),
            settings.image.api_key.clone(),
            settings.image.secret_key.clone(),
            timeout,
        )),
    }
}

pub async fn run(args: Args) -> Result<(), AppError> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => settings::default_config_path()?,
    };
    let mut settings = Settings::load(&config_path)?;
    let command = args.command();

    if command == CliCommand::InitConfig {
        settings.save(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    settings.apply_env_overrides();
    if let Some(database) = &args.database {
        settings.database_path = Some(database.clone());
    }
    settings.validate()?;
    log::info!("Settings loaded from {}", config_path.display());

    match command {
        CliCommand::Image {
            prompt,
            width,
            height,
            size,
            out,
        } => {
            let (width, height) = size.unwrap_or((
                width.unwrap_or(settings.image.width),
                height.unwrap_or(settings.image.height),
            ));
            generate_to_file(&settings, &prompt, width, height, &out).await
        }
        CliCommand::List => {
            let store = open_store(&settings)?;
            let names = store.list_conversations()?;
            for name in &names {
                println!("{name}");
            }
            store.close()?;
            Ok(())
        }
        CliCommand::Export { name, path } => {
            let mut store = open_store(&settings)?;
            let entries = store.list_entries(&name)?;
            export::export_conversation(&entries, &path)?;
            println!("Exported {} entries to {}", entries.len(), path.display());
            store.close()?;
            Ok(())
        }
        CliCommand::Shell | CliCommand::InitConfig => {
            let store = open_store(&settings)?;
            let services = services(&settings);
            let (shell, rx) = Shell::new(store, services, settings, std::io::stdout());
            shell.run(BufReader::new(tokio::io::stdin()), rx).await?;
            Ok(())
        }
    }
}

fn open_store(settings: &Settings) -> Result<ConversationStore, AppError> {
    let path = settings.database_path()?;
    log::info!("Opening conversation store at {}", path.display());
    Ok(ConversationStore::open(&path)?)
}

/// One-shot generation for the `image` subcommand; Ctrl-C cancels the job.
async fn generate_to_file(
    settings: &Settings,
    prompt: &str,
    width: u32,
    height: u32,
    out: &Path,
) -> Result<(), AppError> {
    let request = GenerationRequest::new(prompt, width, height, settings.image.strict_resolutions)?;
    let queue = services(settings).images;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, cancelling image job");
            on_interrupt.cancel();
        }
    });

    eprintln!("Generating {width}x{height} image...");
    let image =
        imaging::generate_image(queue, request, settings.image.poll_policy(), cancel).await?;
    export::save_image(&image, out)?;
    println!("Saved {} to {}", image.describe(), out.display());
    Ok(())
}

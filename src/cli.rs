use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::imaging::parse_dimensions;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "CHATDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Conversation database, overriding `databasePath` from the settings
    #[arg(long, env = "CHATDESK_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Interactive chat shell (the default)
    Shell,
    /// List stored conversations
    List,
    /// Write a conversation transcript to a text file
    Export { name: String, path: PathBuf },
    /// Generate one image and write it to a file
    Image {
        prompt: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Shorthand for --width/--height, e.g. 1024x1024
        #[arg(long, value_parser = parse_dimensions, conflicts_with_all = ["width", "height"])]
        size: Option<(u32, u32)>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the effective settings to the settings file
    InitConfig,
}

impl Args {
    pub fn command(&self) -> CliCommand {
        self.command.clone().unwrap_or(CliCommand::Shell)
    }
}

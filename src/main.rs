use clap::Parser;
use std::process::ExitCode;

use chatdesk_lib::cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match chatdesk_lib::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("chatdesk failed: {:?}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

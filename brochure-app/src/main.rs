use anyhow::Result;
use brochure_app::cli::{Cli, Command};
use brochure_app::{commands, load_settings};
use brochure_common::observability::{LogConfig, LogFormat, init_logging};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig {
        emit_stderr: true,
        format: LogFormat::from_env(),
        ..LogConfig::default()
    })?;

    let config = cli.config.clone();
    let mut stdout = std::io::stdout().lock();
    match cli.into_command() {
        Command::Explain(args) => commands::explain::run(&args, &mut stdout).await,
        Command::Joke(args) => commands::joke::run(&args, &mut stdout).await,
        Command::Brochure(args) => {
            let settings = load_settings(config.as_deref())?;
            commands::brochure::run(&args, &settings, &mut stdout).await
        }
    }
}

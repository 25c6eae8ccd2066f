use clap::Parser;
use docent_cli::cli::{Cli, Command};
use docent_cli::{commands, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init(cli.log_format, cli.verbose)?;

    match cli.command {
        Command::Index(args) => commands::run_index(args).await,
        Command::Ask(args) => commands::run_ask(args).await,
        Command::Chat(args) => commands::run_chat(args).await,
    }
}

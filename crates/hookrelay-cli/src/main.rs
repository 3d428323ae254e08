//! HookRelay CLI main entry point

use clap::Parser;
use hookrelay_cli::{
    cli::{Cli, Commands},
    commands::CheckTokenCommand,
    error::CliResult,
    utils::{init_tracing, ColoredOutput},
};
use tracing::info;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", ColoredOutput::error("Error:"), e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    init_tracing(cli.json_logs, cli.verbose)?;

    // Disable colored output if requested
    if cli.no_color || cli.json_logs {
        colored::control::set_override(false);
    }

    info!("HookRelay v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { args } => hookrelay_cli::commands::serve::execute(args, &cli.config).await,
        Commands::CheckToken { member_id } => {
            CheckTokenCommand::run(&cli.config, &member_id).await.map(|_| ())
        }
    }
}

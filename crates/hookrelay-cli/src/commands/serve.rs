//! Relay server command

use crate::config::{ConfigArgs, RelayConfig};
use crate::error::CliResult;
use clap::Args;
use hookrelay_server::AppState;
use tracing::info;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host and port to bind to [default: 0.0.0.0:3000]
    #[arg(long, env = "HOOKRELAY_BIND")]
    pub bind: Option<String>,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs, config_args: &ConfigArgs) -> CliResult<()> {
    let config = RelayConfig::load(config_args, args.bind.as_deref())?;
    info!(bind = %config.bind, database_url = %config.database_url, "starting relay");
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        tracing::warn!("client id or secret not configured, token refresh will fail");
    }

    let app_state = AppState::from_database_url(&config.database_url, &config.settings()).await?;
    hookrelay_server::serve_rest(app_state, &config.bind).await?;

    Ok(())
}

//! Token health check for one portal

use crate::config::{ConfigArgs, RelayConfig};
use crate::{error::CliResult, utils::ColoredOutput};
use hookrelay_core::TenantId;
use hookrelay_server::AppState;

/// What the check found. The token itself is never printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Missing,
}

pub struct CheckTokenCommand;

impl CheckTokenCommand {
    pub async fn run(config_args: &ConfigArgs, member_id: &str) -> CliResult<TokenStatus> {
        let config = RelayConfig::load(config_args, None)?;
        let state = AppState::from_database_url(&config.database_url, &config.settings()).await?;
        let status = Self::check(&state, &TenantId::from(member_id)).await?;

        match status {
            TokenStatus::Valid => println!(
                "{} valid access token for member {}",
                ColoredOutput::success("✓"),
                ColoredOutput::highlight(member_id)
            ),
            TokenStatus::Missing => println!(
                "{} no credential stored for member {}",
                ColoredOutput::warning("!"),
                ColoredOutput::highlight(member_id)
            ),
        }
        Ok(status)
    }

    /// Refreshes through the token manager when the token is due.
    pub async fn check(state: &AppState, member_id: &TenantId) -> CliResult<TokenStatus> {
        Ok(match state.tokens.get_valid_token(member_id).await? {
            Some(_) => TokenStatus::Valid,
            None => TokenStatus::Missing,
        })
    }
}

//! Relay configuration: optional TOML file, then environment and flags.

use crate::error::{CliError, CliResult};
use clap::Args;
use hookrelay_server::settings::DEFAULT_AUTH_CACHE_TTL_SECS;
use hookrelay_server::RelaySettings;
use hookrelay_connectors::oauth::{DEFAULT_REFRESH_BUFFER_SECS, DEFAULT_TOKEN_URL};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/hookrelay.db";

/// Every field may be omitted from the file.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub bind: String,
    pub database_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub refresh_buffer_secs: i64,
    pub auth_cache_ttl_secs: i64,
    pub db_max_connections: Option<u32>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            auth_cache_ttl_secs: DEFAULT_AUTH_CACHE_TTL_SECS,
            db_max_connections: None,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind", &self.bind)
            .field("database_url", &self.database_url)
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("token_url", &self.token_url)
            .field("refresh_buffer_secs", &self.refresh_buffer_secs)
            .field("auth_cache_ttl_secs", &self.auth_cache_ttl_secs)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

/// Overrides taken from flags or their environment variables.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Optional TOML config file
    #[arg(long = "config", env = "HOOKRELAY_CONFIG", global = true)]
    pub config_file: Option<String>,

    /// Database URL (`sqlite://path` or `memory`)
    #[arg(long, env = "HOOKRELAY_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// OAuth client id of the marketplace app
    #[arg(long, env = "BITRIX_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// OAuth client secret of the marketplace app
    #[arg(long, env = "BITRIX_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub client_secret: Option<String>,

    /// OAuth token endpoint
    #[arg(long, env = "HOOKRELAY_OAUTH_TOKEN_URL", global = true)]
    pub token_url: Option<String>,

    /// Refresh tokens this many seconds before they expire
    #[arg(long, env = "HOOKRELAY_REFRESH_BUFFER_SECS", global = true)]
    pub refresh_buffer_secs: Option<i64>,

    /// Lifetime of a verified admin caller
    #[arg(long, env = "HOOKRELAY_AUTH_CACHE_TTL_SECS", global = true)]
    pub auth_cache_ttl_secs: Option<i64>,

    /// SQLite pool size
    #[arg(long, env = "HOOKRELAY_DB_MAX_CONNECTIONS", global = true)]
    pub db_max_connections: Option<u32>,
}

impl RelayConfig {
    /// Read a TOML file. A missing file is an error; no file means defaults.
    pub fn from_file(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// File first, then flags and environment on top.
    pub fn load(args: &ConfigArgs, bind: Option<&str>) -> CliResult<Self> {
        let mut config = Self::from_file(args.config_file.as_deref().map(Path::new))?;
        config.apply(args, bind);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, args: &ConfigArgs, bind: Option<&str>) {
        if let Some(bind) = bind {
            self.bind = bind.to_string();
        }
        if let Some(v) = &args.database_url {
            self.database_url = v.clone();
        }
        if let Some(v) = &args.client_id {
            self.client_id = v.clone();
        }
        if let Some(v) = &args.client_secret {
            self.client_secret = v.clone();
        }
        if let Some(v) = &args.token_url {
            self.token_url = v.clone();
        }
        if let Some(v) = args.refresh_buffer_secs {
            self.refresh_buffer_secs = v;
        }
        if let Some(v) = args.auth_cache_ttl_secs {
            self.auth_cache_ttl_secs = v;
        }
        if let Some(v) = args.db_max_connections {
            self.db_max_connections = Some(v);
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        self.bind.parse::<SocketAddr>().map_err(|e| {
            CliError::InvalidArgument(format!("bind address '{}': {}", self.bind, e))
        })?;
        if self.database_url.trim().is_empty() {
            return Err(CliError::InvalidArgument("database_url is empty".to_string()));
        }
        if self.refresh_buffer_secs < 0 {
            return Err(CliError::InvalidArgument(
                "refresh_buffer_secs must not be negative".to_string(),
            ));
        }
        if self.auth_cache_ttl_secs < 0 {
            return Err(CliError::InvalidArgument(
                "auth_cache_ttl_secs must not be negative".to_string(),
            ));
        }
        if self.db_max_connections == Some(0) {
            return Err(CliError::InvalidArgument(
                "db_max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> RelaySettings {
        RelaySettings {
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_buffer_secs: self.refresh_buffer_secs,
            auth_cache_ttl_secs: self.auth_cache_ttl_secs,
            db_max_connections: self.db_max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = RelayConfig::load(&ConfigArgs::default(), None).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.refresh_buffer_secs, 300);
        assert_eq!(config.auth_cache_ttl_secs, 300);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind = "127.0.0.1:4000"
database_url = "memory"
client_id = "app.from.file"
client_secret = "file-secret"
refresh_buffer_secs = 60
"#
        )
        .unwrap();

        let args = ConfigArgs {
            config_file: Some(file.path().to_string_lossy().into_owned()),
            client_id: Some("app.from.env".into()),
            db_max_connections: Some(4),
            ..Default::default()
        };
        let config = RelayConfig::load(&args, Some("127.0.0.1:5000")).unwrap();

        assert_eq!(config.bind, "127.0.0.1:5000");
        assert_eq!(config.database_url, "memory");
        assert_eq!(config.client_id, "app.from.env");
        assert_eq!(config.client_secret, "file-secret");
        assert_eq!(config.refresh_buffer_secs, 60);
        assert_eq!(config.db_max_connections, Some(4));

        let settings = config.settings();
        assert_eq!(settings.client_id, "app.from.env");
        assert_eq!(settings.db_max_connections, Some(4));
        assert!(!format!("{:?}", config).contains("file-secret"));
    }

    #[test]
    fn rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "colour = \"blue\"").unwrap();
        let args = ConfigArgs {
            config_file: Some(file.path().to_string_lossy().into_owned()),
            ..Default::default()
        };
        assert!(matches!(RelayConfig::load(&args, None), Err(CliError::Toml(_))));

        assert!(matches!(
            RelayConfig::load(&ConfigArgs::default(), Some("not-an-address")),
            Err(CliError::InvalidArgument(_))
        ));

        let args = ConfigArgs {
            config_file: Some("/definitely/not/here.toml".into()),
            ..Default::default()
        };
        assert!(matches!(RelayConfig::load(&args, None), Err(CliError::Config(_))));
    }
}

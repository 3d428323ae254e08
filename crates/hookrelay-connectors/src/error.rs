use hookrelay_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Bad invocation input. Never reaches the network.
    #[error("{0}")]
    Validation(String),

    /// DNS, connect, TLS or protocol failure on an outbound call.
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Timeout(String),

    /// Delivery back to the workflow engine failed.
    #[error("Callback failed: {0}")]
    Callback(String),

    /// No usable credential for the tenant, or the refresh failed.
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ConnectorError {
    /// Whether the failure happened on the wire rather than in our input.
    pub fn is_transport(&self) -> bool {
        matches!(self, ConnectorError::Transport(_) | ConnectorError::Timeout(_))
    }
}

impl From<ConnectorError> for CoreError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Serialization(e) => CoreError::Serde(e.to_string()),
            ConnectorError::Core(e) => e,
            ConnectorError::Validation(msg) => CoreError::Invalid(msg),
            ConnectorError::InvalidConfig(msg) => CoreError::Invalid(msg),
            ConnectorError::Credential(msg) => CoreError::NotFound(msg),
            ConnectorError::Transport(msg)
            | ConnectorError::Timeout(msg)
            | ConnectorError::Callback(msg) => CoreError::Other(msg),
        }
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlackMcpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Slack handshake failed: {0}")]
    Handshake(String),

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlackMcpError {
    /// Errors the process cannot recover from: it must not start serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Handshake(_))
    }
}

pub type Result<T> = std::result::Result<T, SlackMcpError>;

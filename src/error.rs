use thiserror::Error;

use crate::sentinel::events::DiscardReason;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ERR No working sentinels")]
    NoSentinelsAvailable,

    #[error("ERR Sentinel connection {endpoint} failed: {message}")]
    SentinelConnection { endpoint: String, message: String },

    #[error("ERR Malformed sentinel reply: {0}")]
    MalformedReply(String),

    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("ERR Config: {0}")]
    Config(String),

    #[error("ERR Replication: {0}")]
    Replication(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn connection(endpoint: impl ToString, message: impl ToString) -> Self {
        Self::SentinelConnection {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReply(message.into())
    }

    /// Whether the orchestrator should discard the current sentinel and move on
    pub fn is_recoverable(&self) -> bool {
        self.discard_reason().is_some()
    }

    /// Classify a recoverable error for discard events
    pub fn discard_reason(&self) -> Option<DiscardReason> {
        match self {
            Self::SentinelConnection { .. } | Self::Io(_) => Some(DiscardReason::Connection),
            Self::MalformedReply(_) | Self::Protocol(_) => Some(DiscardReason::MalformedReply),
            Self::NoSentinelsAvailable | Self::Config(_) | Self::Replication(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

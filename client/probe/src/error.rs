//! Error types for the probe.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("config: {0}")]
    Config(String),

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("output: {0}")]
    Output(#[from] std::io::Error),
}

impl ProbeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport_kind(&self) -> &'static str {
        match self {
            ProbeError::Transport(err) if err.is_timeout() => "timeout",
            ProbeError::Transport(err) if err.is_connect() => "connect",
            ProbeError::Transport(_) => "request",
            ProbeError::Config(_) => "config",
            ProbeError::Output(_) => "output",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

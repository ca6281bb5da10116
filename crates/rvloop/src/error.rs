use thiserror::Error;

use crate::replay::ReplayError;

/// Analyzer errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("report already emitted: shutdown runs once per analyzer")]
    AlreadyReported,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Invalid analyzer option.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("option '{0}' needs a value (key=value)")]
    MissingValue(String),
    #[error("invalid value '{value}' for option '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

//! Error types for hostd.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No record carries this id.
    #[error("vm not found: {0}")]
    NotFound(u32),

    /// The registry already holds its maximum number of records.
    #[error("capacity exceeded ({0} vms)")]
    CapacityExceeded(usize),

    /// The registry service task is gone.
    #[error("registry service unavailable")]
    Unavailable,
}

/// Errors produced while handling one protocol line.
///
/// The `Display` text is exactly what follows `400 ERR ` on the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Malformed command or missing required key.
    #[error("{0}")]
    Parse(String),

    #[error("not found")]
    NotFound,

    #[error("capacity exceeded ({0} vms)")]
    CapacityExceeded(usize),

    #[error("unknown command")]
    UnknownCommand,

    #[error("internal")]
    Internal,
}

impl From<RegistryError> for CommandError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => CommandError::NotFound,
            RegistryError::CapacityExceeded(n) => CommandError::CapacityExceeded(n),
            RegistryError::Unavailable => CommandError::Internal,
        }
    }
}

/// Fatal listener setup errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind {path} failed: {source}")]
    BindUnix { path: PathBuf, source: io::Error },

    #[error("bind {addr} failed: {source}")]
    BindTcp { addr: String, source: io::Error },

    #[error("invalid bind host: {0}")]
    InvalidHost(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read failed: {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("config parse failed: {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid tcp address: {0} (expected host:port)")]
    InvalidTcpAddress(String),

    #[error("both a unix socket and a tcp address were given, pick one")]
    ConflictingTransports,
}

pub type Result<T> = std::result::Result<T, ServerError>;

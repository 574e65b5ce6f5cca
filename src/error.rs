//! Error types for the output driver

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output driver errors
#[derive(Error, Debug, Clone)]
pub enum OutputError {
    #[error("Failed to allocate output buffer ({0} bytes)")]
    BufferAlloc(usize),

    #[error("Failed to spawn output thread: {0}")]
    ThreadSpawn(String),

    #[error("Sink write failed: {0}")]
    SinkWrite(String),
}

/// Format header wire errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Truncated header: {0} bytes")]
    Truncated(usize),

    #[error("Bad header magic")]
    BadMagic,

    #[error("Unsupported header version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown stream variant code: {0}")]
    UnknownVariant(u8),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

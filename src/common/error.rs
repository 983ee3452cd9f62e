//! Error types for bytekv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Storage Errors ===
    #[error("key not found: {0}")]
    KeyNotFound(String),

    // === Protocol Errors ===
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected reply byte from server: 0x{0:02x}")]
    UnexpectedReply(u8),

    // === Config Errors ===
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this the recoverable key-not-found condition?
    ///
    /// Everything else in the taxonomy is fatal to the operation or the
    /// connection that raised it.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_))
    }
}

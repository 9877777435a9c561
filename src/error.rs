use std::io;

use thiserror::Error;

/// Behavioural error categories for the transport engine and the sessions
/// that sit on top of it.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("bad checksum on sequence {sequence}: expected {expected}, got {got}")]
    BadChecksum {
        sequence: u32,
        expected: u8,
        got: u8,
    },

    #[error("timed out waiting for a packet")]
    Timeout,

    #[error("exceeded the maximum number of retries for sequence {sequence}")]
    MaxRetriesExceeded { sequence: u32 },

    #[error("remote file not found")]
    RemoteFileNotFound,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl TransferError {
    /// Exit code a CLI front-end should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            TransferError::MaxRetriesExceeded { .. } => 2,
            TransferError::RemoteFileNotFound => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

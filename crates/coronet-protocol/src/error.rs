//! Error types for coronet-protocol.

use thiserror::Error;

/// Result type for coronet-protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding admin messages.
#[derive(Debug, Error)]
pub enum Error {
    /// The classifier byte does not name a known admin message type.
    #[error("unknown admin message classifier: {0:#04x}")]
    UnknownClassifier(u8),

    /// A text payload was not valid UTF-8.
    #[error("invalid text payload: {0}")]
    InvalidPayload(#[from] std::string::FromUtf8Error),

    /// A device-id payload was empty.
    #[error("empty device id payload for classifier {0:#04x}")]
    EmptyDeviceId(u8),

    /// The frame header announced more payload than the configured maximum.
    #[error("frame payload of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The buffer ended before the announced payload was complete.
    #[error("truncated frame: expected {expected} payload bytes, got {got}")]
    Truncated { expected: usize, got: usize },
}

use thiserror::Error;

/// Failures that stop frame decoding.
///
/// Both end the stream: the bytes cannot be turned back into text, so no
/// later frame can be trusted. A single frame with a bad JSON payload is not
/// one of these; see [`crate::errors::FrameDecodeError`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// A byte sequence that can never be valid UTF-8.
    #[error("invalid utf-8 at byte {offset} of the decode buffer")]
    InvalidUtf8 { offset: usize },

    /// The body ended inside a multi-byte character.
    #[error("stream ended inside a multi-byte character ({pending} trailing bytes)")]
    IncompleteUtf8 { pending: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

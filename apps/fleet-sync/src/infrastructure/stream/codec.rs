//! Stream Codec
//!
//! Every frame carries exactly one JSON envelope `{"type": ..., "payload": ...}`.
//! The payload stays an untyped `Value`; subscribers decode it.

use crate::domain::streaming::StreamEnvelope;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a JSON object.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),

    /// Binary frames are not part of the protocol.
    #[error("unexpected binary frame ({0} bytes)")]
    UnexpectedBinary(usize),
}

impl CodecError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::InvalidFormat(_) => "format",
            Self::UnexpectedBinary(_) => "binary",
        }
    }
}

/// JSON codec for stream envelopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object with a string
    /// `type`. An empty `type` is a valid routing key.
    pub fn decode(&self, text: &str) -> Result<StreamEnvelope, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            let preview: String = trimmed.chars().take(50).collect();
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {preview}..."
            )));
        }

        Ok(serde_json::from_str(trimmed)?)
    }

    /// Decode a binary frame. Always fails: the server only sends text.
    ///
    /// # Errors
    ///
    /// Always returns [`CodecError::UnexpectedBinary`].
    pub const fn decode_binary(&self, data: &[u8]) -> Result<StreamEnvelope, CodecError> {
        Err(CodecError::UnexpectedBinary(data.len()))
    }
}

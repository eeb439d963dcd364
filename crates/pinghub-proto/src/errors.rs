//! Protocol error types.

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame payload exceeds [`crate::MAX_FRAME_SIZE`].
    ///
    /// Rejected before JSON parsing begins so a hostile peer cannot make the
    /// parser chew on an arbitrarily large input.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Maximum allowed payload size in bytes.
        max: usize,
    },

    /// JSON serialization or deserialization failed.
    ///
    /// Indicates a malformed event from the peer or a logic bug on the
    /// encoding side. Fatal for that frame only.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame ended before the declared payload length.
    #[error("truncated frame: expected {expected} bytes, got {got}")]
    Truncated {
        /// Bytes the length prefix promised.
        expected: usize,
        /// Bytes actually available.
        got: usize,
    },
}

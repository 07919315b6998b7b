//! Error types for image load/save operations.
//!
//! The codec engine reports failures through a thread-local last-error
//! channel (code + message). The functions here drain that channel and
//! translate it into the caller-facing error enums.

use crate::codec;

/// Errors that can occur while decoding an image into a handle.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("unsupported or undecodable image: {0}")]
    UnsupportedFormat(String),
}

/// Errors that can occur while encoding a handle to a file.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to encode image: {0}")]
    EncodeFailed(String),

    #[error("failed to write image: {0}")]
    WriteFailed(String),
}

/// Builds a [`LoadError`] from the codec's last error, or a fallback message.
pub(crate) fn load_error_from_last(fallback: &str) -> LoadError {
    match codec::take_last_error() {
        Some((codec::ERR_NOT_FOUND, msg)) => LoadError::NotFound(msg),
        Some((_, msg)) => LoadError::UnsupportedFormat(msg),
        None => LoadError::UnsupportedFormat(fallback.to_string()),
    }
}

/// Builds a [`SaveError`] from the codec's last error, or a fallback message.
pub(crate) fn save_error_from_last(fallback: &str) -> SaveError {
    match codec::take_last_error() {
        Some((codec::ERR_WRITE, msg)) => SaveError::WriteFailed(msg),
        Some((_, msg)) => SaveError::EncodeFailed(msg),
        None => SaveError::EncodeFailed(fallback.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_when_no_engine_error() {
        // Make sure no stale error is pending from another test body.
        let _ = codec::take_last_error();

        let err = load_error_from_last("decode failed");
        assert!(matches!(err, LoadError::UnsupportedFormat(msg) if msg == "decode failed"));

        let err = save_error_from_last("encode failed");
        assert!(matches!(err, SaveError::EncodeFailed(msg) if msg == "encode failed"));
    }
}

//! Error types for Paircast.
//!
//! This module provides a unified error type for all engine operations,
//! with specific variants for transport, framing, and transfer failures.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Paircast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Paircast.
#[derive(Error, Debug)]
pub enum Error {
    /// Could not bind the listening socket
    #[error("failed to bind port {port}: {reason}")]
    Bind {
        /// Requested port
        port: u16,
        /// Underlying reason
        reason: String,
    },

    /// A session is already listening or connected
    #[error("session already active, stop it before starting a new one")]
    SessionActive,

    /// Send was attempted without a connected peer
    #[error("no peer connected")]
    NotConnected,

    /// Writing a frame to the peer failed
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Stream ended before a complete length prefix was read
    #[error("stream closed before a complete length prefix was read")]
    ShortRead,

    /// Stream ended before the declared payload length arrived
    #[error("stream closed after {received} of {expected} payload bytes")]
    TruncatedMessage {
        /// Declared payload length
        expected: usize,
        /// Bytes actually received
        received: usize,
    },

    /// Declared frame length exceeds the session's limit
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// Payload was not a recognizable protocol message
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// File could not be read for sending
    #[error("cannot read file '{0}'")]
    FileUnreadable(String),

    /// Received file payload was not valid base64
    #[error("invalid file payload encoding: {0}")]
    Decode(String),

    /// Folder archive could not be built
    #[error("failed to archive folder: {0}")]
    Archive(String),

    /// Clipboard access failed
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable kind, used in `error` events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "bind",
            Self::SessionActive => "session_active",
            Self::NotConnected => "not_connected",
            Self::SendFailed(_) => "send_failed",
            Self::ShortRead => "short_read",
            Self::TruncatedMessage { .. } => "truncated_message",
            Self::FrameTooLarge(_) => "frame_too_large",
            Self::MalformedMessage(_) => "malformed_message",
            Self::FileUnreadable(_) => "file_unreadable",
            Self::Decode(_) => "decode",
            Self::Archive(_) => "archive",
            Self::Clipboard(_) => "clipboard",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns whether this error tears down the connection.
    ///
    /// Framing-level failures leave the stream without a recoverable
    /// message boundary; everything else aborts only the operation that
    /// raised it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ShortRead | Self::TruncatedMessage { .. } | Self::FrameTooLarge(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_errors_are_fatal() {
        assert!(Error::ShortRead.is_fatal());
        assert!(Error::TruncatedMessage {
            expected: 10,
            received: 3
        }
        .is_fatal());
        assert!(Error::FrameTooLarge(usize::MAX).is_fatal());
    }

    #[test]
    fn per_message_errors_are_not_fatal() {
        assert!(!Error::MalformedMessage("bad json".to_string()).is_fatal());
        assert!(!Error::Decode("bad base64".to_string()).is_fatal());
        assert!(!Error::SendFailed("broken pipe".to_string()).is_fatal());
        assert!(!Error::NotConnected.is_fatal());
    }

    #[test]
    fn kind_is_stable() {
        assert_eq!(Error::NotConnected.kind(), "not_connected");
        assert_eq!(
            Error::Bind {
                port: 8888,
                reason: "in use".to_string()
            }
            .kind(),
            "bind"
        );
    }
}

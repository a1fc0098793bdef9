//! Wire protocol: length-prefixed JSON frames.
//!
//! Every protocol message travels as one frame:
//!
//! ```text
//! ┌────────────┬─────────────────────┐
//! │   Length   │       Payload       │
//! │  4 bytes   │  (variable length)  │
//! └────────────┴─────────────────────┘
//! ```
//!
//! - Length: payload length in bytes (big-endian u32)
//! - Payload: one JSON object, tagged by a `type` field
//!
//! The codec moves opaque byte sequences and knows nothing about message
//! semantics; it enforces no maximum length of its own. [`Message`] gives
//! the payloads their meaning.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// Size of the frame length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A protocol message.
///
/// The wire representation is a JSON object with a `type` tag, e.g.
/// `{"type":"clipboard","data":"hello"}`. Unrecognized tags deserialize
/// to [`Message::Unknown`] so future message kinds are skipped rather
/// than treated as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Clipboard text pushed by one side to the other.
    Clipboard {
        /// The clipboard text
        data: String,
    },
    /// Request for the peer's current clipboard content.
    ClipboardRequest,
    /// A complete file (or folder archive), unchunked.
    File {
        /// Base name of the file
        name: String,
        /// Original size in bytes (informational; not re-validated here)
        size: u64,
        /// File content, base64-encoded
        data: String,
    },
    /// Any message kind this version does not understand.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Short name of the message kind, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Clipboard { .. } => "clipboard",
            Self::ClipboardRequest => "clipboard_request",
            Self::File { .. } => "file",
            Self::Unknown => "unknown",
        }
    }
}

/// Parse a frame payload into a [`Message`].
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the payload is not a JSON object
/// with a `type` field and the fields that kind requires.
pub fn parse(payload: &[u8]) -> Result<Message> {
    serde_json::from_slice(payload).map_err(|e| Error::MalformedMessage(e.to_string()))
}

/// Serialize a [`Message`] into a frame payload.
///
/// Round-trips with [`parse`] for every sendable message.
///
/// # Errors
///
/// Returns [`Error::Internal`] if serialization fails (not expected for
/// any constructible message).
pub fn serialize(message: &Message) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| Error::Internal(e.to_string()))
}

/// Big-endian length prefix for a payload of `len` bytes.
///
/// The prefix is a u32, so payloads past `u32::MAX` bytes cannot be
/// framed at all; letting the length wrap would write a torn frame and
/// corrupt the peer's stream.
fn length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE]> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| Error::FrameTooLarge(len))
}

/// Prepend the 4-byte big-endian length prefix to a payload.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] if the payload length does not fit
/// the u32 prefix.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let prefix = length_prefix(payload.len())?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&prefix);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one frame payload from a stream.
///
/// Equivalent to [`read_frame_capped`] without a length cap.
///
/// # Errors
///
/// See [`read_frame_capped`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    read_frame_capped(reader, usize::MAX).await
}

/// Read one frame payload from a stream, rejecting frames over `max_len`.
///
/// Blocks until the full payload has accumulated, across as many
/// underlying reads as necessary.
///
/// # Errors
///
/// - [`Error::ShortRead`] if the stream closes before a complete length
///   prefix arrives (including clean EOF between frames).
/// - [`Error::FrameTooLarge`] if the declared length exceeds `max_len`.
/// - [`Error::TruncatedMessage`] if the stream closes before the declared
///   payload length arrives.
pub async fn read_frame_capped<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut prefix).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ShortRead
        } else {
            Error::Io(e)
        }
    })?;

    let expected = u32::from_be_bytes(prefix) as usize;
    if expected > max_len {
        return Err(Error::FrameTooLarge(expected));
    }

    let mut payload = vec![0u8; expected];
    let mut received = 0;
    while received < expected {
        let n = reader.read(&mut payload[received..]).await?;
        if n == 0 {
            return Err(Error::TruncatedMessage { expected, received });
        }
        received += n;
    }

    Ok(payload)
}

/// Write one framed payload to a stream and flush it.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] if the payload cannot be framed
/// (nothing is written in that case), or an error if writing fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(&encode_frame(payload)?).await?;
    writer.flush().await?;
    Ok(())
}

/// Extract the peer device name from a handshake payload, best effort.
///
/// The first frame after accept is expected to be a JSON object carrying
/// `device_name`; anything else yields `None` rather than an error.
#[must_use]
pub fn handshake_device_name(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value
        .get("device_name")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn frame_roundtrip() {
        let payload = b"arbitrary \x00\xff bytes";
        let mut cursor = Cursor::new(encode_frame(payload).unwrap());
        let decoded = read_frame(&mut cursor).await.expect("read frame");
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn frame_roundtrip_empty_payload() {
        let mut cursor = Cursor::new(encode_frame(b"").unwrap());
        let decoded = read_frame(&mut cursor).await.expect("read frame");
        assert!(decoded.is_empty());
    }

    #[tokio::test]
    async fn two_frames_back_to_back() {
        let mut bytes = encode_frame(b"first").unwrap();
        bytes.extend_from_slice(&encode_frame(b"second").unwrap());
        let mut cursor = Cursor::new(bytes);

        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"first");
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"second");
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(Error::ShortRead)
        ));
    }

    #[tokio::test]
    async fn short_read_on_partial_prefix() {
        let mut cursor = Cursor::new(vec![0u8, 0, 1]);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(Error::ShortRead)
        ));
    }

    #[tokio::test]
    async fn truncated_payload_reports_counts() {
        let mut frame = encode_frame(b"full payload").unwrap();
        frame.truncate(LENGTH_PREFIX_SIZE + 4);
        let mut cursor = Cursor::new(frame);

        match read_frame(&mut cursor).await {
            Err(Error::TruncatedMessage { expected, received }) => {
                assert_eq!(expected, 12);
                assert_eq!(received, 4);
            }
            other => panic!("expected TruncatedMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_frame_rejected_before_allocation() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut cursor = Cursor::new(frame);

        assert!(matches!(
            read_frame_capped(&mut cursor, 1024).await,
            Err(Error::FrameTooLarge(_))
        ));
    }

    #[test]
    fn payload_past_prefix_range_cannot_be_framed() {
        // A length that wraps the u32 prefix must be rejected, not
        // silently truncated into a torn frame.
        let Ok(len) = usize::try_from(u64::from(u32::MAX) + 1) else {
            return; // 32-bit target: such a payload cannot exist
        };
        assert!(matches!(length_prefix(len), Err(Error::FrameTooLarge(_))));
        assert!(length_prefix(u32::MAX as usize).is_ok());
    }

    #[tokio::test]
    async fn write_then_read_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"over the wire")
            .await
            .expect("write frame");
        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"over the wire");
    }

    #[test]
    fn message_roundtrip_all_kinds() {
        let messages = [
            Message::Clipboard {
                data: "hello from the desktop".to_string(),
            },
            Message::ClipboardRequest,
            Message::File {
                name: "report.pdf".to_string(),
                size: 4096,
                data: "aGVsbG8=".to_string(),
            },
        ];

        for message in messages {
            let bytes = serialize(&message).expect("serialize");
            let parsed = parse(&bytes).expect("parse");
            assert_eq!(parsed, message);
        }
    }

    #[test]
    fn wire_format_matches_mobile_peer() {
        // The mobile app matches on these exact tag and field names.
        let bytes = serialize(&Message::Clipboard {
            data: "x".to_string(),
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"type":"clipboard","data":"x"}"#
        );

        let parsed = parse(br#"{"type":"file","name":"a.txt","size":3,"data":"YWJj"}"#).unwrap();
        assert_eq!(
            parsed,
            Message::File {
                name: "a.txt".to_string(),
                size: 3,
                data: "YWJj".to_string(),
            }
        );
    }

    #[test]
    fn unknown_type_is_not_fatal() {
        let parsed = parse(br#"{"type":"ping","data":"whatever"}"#).expect("parse");
        assert_eq!(parsed, Message::Unknown);
    }

    #[test]
    fn missing_required_field_is_malformed() {
        assert!(matches!(
            parse(br#"{"type":"clipboard"}"#),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            parse(br#"{"type":"file","name":"a.txt"}"#),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn missing_type_tag_is_malformed() {
        assert!(matches!(
            parse(br#"{"data":"hello"}"#),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(parse(b"not json"), Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn handshake_name_extraction_is_best_effort() {
        assert_eq!(
            handshake_device_name(br#"{"device_name":"Pixel 8"}"#),
            Some("Pixel 8".to_string())
        );
        assert_eq!(handshake_device_name(br#"{"device_name":42}"#), None);
        assert_eq!(handshake_device_name(b"garbage"), None);
    }
}

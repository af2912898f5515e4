//! Native messaging framing.
//!
//! Each message is a 4-byte length in native byte order followed by that
//! many bytes of UTF-8 JSON. Both ends of the light channel use this module:
//! the link writes commands and reads replies, the host does the reverse.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

/// Largest accepted inbound message (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Encode one payload as a complete frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Serialize `message` to JSON and frame it.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(message)?;
    Ok(encode_frame(&payload))
}

/// Read one frame body. Returns `Ok(None)` on a clean EOF between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let read = reader.read(&mut header[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::Truncated);
        }
        filled += read;
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_MESSAGE_SIZE {
        // Skip the body so the next read starts on a frame boundary.
        tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
        return Err(FrameError::TooLarge {
            len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::Empty);
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Read and decode one JSON message. `Ok(None)` on clean EOF.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

/// Serialize, frame, write and flush one message.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_message(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn reads_back_written_message() {
        let mut buf = Vec::new();
        write_message(&mut buf, &json!({"action": "turn_off"}))
            .await
            .expect("write");
        assert_eq!(&buf[..4], &21u32.to_ne_bytes());

        let mut reader = buf.as_slice();
        let message: Option<Value> = read_message(&mut reader).await.expect("read");
        assert_eq!(message, Some(json!({"action": "turn_off"})));

        let eof: Option<Value> = read_message(&mut reader).await.expect("eof");
        assert!(eof.is_none(), "clean EOF between frames yields None");
    }

    #[tokio::test]
    async fn rejects_oversized_length() {
        let header = ((MAX_MESSAGE_SIZE + 1) as u32).to_ne_bytes();
        let mut reader = &header[..];
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn oversized_body_is_skipped_before_next_frame() {
        let len = MAX_MESSAGE_SIZE + 1;
        let mut bytes = (len as u32).to_ne_bytes().to_vec();
        let hidden = encode_message(&json!({"action": "turn_off"})).expect("frame");
        bytes.extend_from_slice(&hidden);
        bytes.resize(4 + len, b' ');
        bytes.extend(encode_message(&json!({"action": "discover"})).expect("frame"));

        let mut reader = bytes.as_slice();
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }), "got: {err}");

        let next: Option<Value> = read_message(&mut reader).await.expect("next frame");
        assert_eq!(next, Some(json!({"action": "discover"})));
    }

    #[tokio::test]
    async fn rejects_empty_message() {
        let header = 0u32.to_ne_bytes();
        let mut reader = &header[..];
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::Empty));
    }

    #[tokio::test]
    async fn partial_header_is_truncated() {
        let bytes = [5u8, 0];
        let mut reader = &bytes[..];
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::Truncated));
    }

    #[tokio::test]
    async fn short_body_is_io_error() {
        let mut bytes = 10u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let mut reader = bytes.as_slice();
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }
}

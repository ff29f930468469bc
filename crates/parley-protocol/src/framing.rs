//! Length-prefixed framing for TCP streams.
//!
//! TCP delivers a byte stream, not messages. One `read` may return half an
//! envelope, or two and a bit. So every envelope on the wire is wrapped in
//! a frame:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does **not** include the 4 prefix bytes. The payload is one
//! codec-encoded [`Message`](crate::Message).
//!
//! [`read_frame`] reassembles exactly one payload however the stream is
//! chunked; [`encode_frame`] produces prefix and payload as ONE buffer so
//! the writer can hand it to the socket in a single `write_all`.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use parley_transport::TransportError;

use crate::ProtocolError;

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default cap on a single payload: 1 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Wraps `payload` in a frame.
///
/// # Errors
/// [`ProtocolError::FrameTooLarge`] if `payload` exceeds `max_len` (or
/// doesn't fit the `u32` prefix at all).
pub fn encode_frame(payload: &[u8], max_len: usize) -> Result<Vec<u8>, ProtocolError> {
    let too_large = || ProtocolError::FrameTooLarge {
        len: payload.len(),
        max: max_len,
    };
    if payload.len() > max_len {
        return Err(too_large());
    }
    let len = u32::try_from(payload.len()).map_err(|_| too_large())?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Writes an already-encoded frame and flushes.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
) -> Result<(), ProtocolError> {
    writer
        .write_all(frame)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)?;
    Ok(())
}

/// Reads one frame and returns its payload.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly, i.e. at a
/// frame boundary.
///
/// # Errors
/// - [`ProtocolError::FrameTooLarge`] — the prefix declares more than
///   `max_len` bytes. Nothing past the prefix is consumed.
/// - [`ProtocolError::Transport`] — the read failed, or the stream ended
///   partway through a frame.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    // `read_exact` can't distinguish "closed before the frame" from "closed
    // inside the prefix", so the prefix is filled by hand.
    let mut prefix = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let n = reader
            .read(&mut prefix[filled..])
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(mid_frame_eof());
        }
        filled += n;
    }

    let len = u32::from_le_bytes(prefix) as usize;
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            mid_frame_eof()
        } else {
            TransportError::ReceiveFailed(e).into()
        }
    })?;
    Ok(Some(payload))
}

fn mid_frame_eof() -> ProtocolError {
    TransportError::ConnectionClosed("stream ended mid-frame".into()).into()
}

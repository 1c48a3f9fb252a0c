//! Wire format for command framing.
//!
//! Requests are length-prefixed: [4 bytes big-endian u32][payload]
//! Responses are a single result code: [8 bytes big-endian i64]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{DaemonError, DaemonResult, ProtocolErrorKind};

/// Size of an encoded response.
pub const RESULT_FRAME_LEN: usize = 8;

/// Length of the next request payload, read from its prefix.
///
/// Returns ConnectionClosed when the peer closes cleanly between frames.
pub async fn read_length<R>(reader: &mut R) -> DaemonResult<usize>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => Ok(u32::from_be_bytes(len_buf) as usize),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(DaemonError::Protocol {
            kind: ProtocolErrorKind::ConnectionClosed,
        }),
        Err(e) => Err(DaemonError::Io(e)),
    }
}

/// Read a length-prefixed payload from the reader.
///
/// Returns PayloadTooLarge without consuming the body when the announced
/// length exceeds `max_size`.
pub async fn read_payload<R>(reader: &mut R, max_size: usize) -> DaemonResult<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    let len = read_length(reader).await?;

    // Sanity check payload size
    if len > max_size {
        return Err(DaemonError::Protocol {
            kind: ProtocolErrorKind::PayloadTooLarge {
                size: len,
                max: max_size,
            },
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    Ok(buf)
}

/// Write a result code to the writer.
pub async fn write_result<W>(writer: &mut W, code: i64) -> DaemonResult<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(&code.to_be_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed payload with a timeout.
///
/// Returns a ConnectionTimeout error if the read takes longer than the specified duration.
pub async fn read_payload_with_timeout<R>(
    reader: &mut R,
    max_size: usize,
    timeout_duration: Duration,
) -> DaemonResult<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    timeout(timeout_duration, read_payload(reader, max_size))
        .await
        .map_err(|_| DaemonError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

/// Write a result code with a timeout.
///
/// Returns a ConnectionTimeout error if the write takes longer than the specified duration.
pub async fn write_result_with_timeout<W>(
    writer: &mut W,
    code: i64,
    timeout_duration: Duration,
) -> DaemonResult<()>
where
    W: AsyncWriteExt + Unpin,
{
    timeout(timeout_duration, write_result(writer, code))
        .await
        .map_err(|_| DaemonError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

/// Frame a request payload for sending.
pub fn encode_request(payload: &[u8]) -> DaemonResult<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| DaemonError::Protocol {
        kind: ProtocolErrorKind::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        },
    })?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode a response frame.
pub fn decode_result(frame: [u8; RESULT_FRAME_LEN]) -> i64 {
    i64::from_be_bytes(frame)
}

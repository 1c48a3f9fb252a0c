//! Per-connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandRegistry, ExecutionContext, Verb};
use crate::config::LimitsConfig;
use crate::error::{DaemonError, DaemonResult, ProtocolErrorKind};
use crate::protocol::{read_payload_with_timeout, result_code, write_result_with_timeout};

use super::ConnectionMetrics;

/// Handle a single client connection on `verb`'s endpoint.
///
/// Each frame on the connection is one command. The connection ends when
/// the client closes it, a read times out, or a payload is too large.
pub async fn handle_connection(
    stream: UnixStream,
    verb: Verb,
    registry: Arc<CommandRegistry>,
    limits: Arc<LimitsConfig>,
    metrics: Arc<ConnectionMetrics>,
) -> DaemonResult<()> {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let result =
            process_request(&mut reader, &mut writer, verb, &registry, &limits, &metrics).await;

        match result {
            Ok(()) => continue,
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!(verb = %verb, "Client disconnected");
                return Ok(());
            }
            Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                warn!(verb = %verb, "Connection timed out");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Process a single request frame from the client.
async fn process_request<R, W>(
    reader: &mut R,
    writer: &mut W,
    verb: Verb,
    registry: &Arc<CommandRegistry>,
    limits: &LimitsConfig,
    metrics: &ConnectionMetrics,
) -> DaemonResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let socket_timeout = Duration::from_secs(limits.socket_timeout_seconds);
    let read = read_payload_with_timeout(reader, limits.max_payload_size, socket_timeout).await;
    let payload = match read {
        Ok(payload) => payload,
        Err(DaemonError::Protocol {
            kind: ProtocolErrorKind::PayloadTooLarge { size, max },
        }) => {
            // The body was not consumed, so the stream cannot be resynchronized
            warn!(verb = %verb, size = size, max = max, "Payload too large, closing connection");
            metrics.record_request(false);
            write_result_with_timeout(writer, -(Errno::ENOMEM as i64), socket_timeout).await?;
            return Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            });
        }
        Err(e) => return Err(e),
    };

    let ctx = ExecutionContext::now(verb, payload.len());
    let request_id = ctx.request_id;
    let start_time = Instant::now();

    // Filesystem calls block, keep them off the reactor
    let task_registry = Arc::clone(registry);
    let result = tokio::task::spawn_blocking(move || task_registry.dispatch(&ctx, &payload)).await;

    let code = match result {
        Ok(Ok(outcome)) => result_code(&outcome),
        Ok(Err(e)) => {
            error!(request_id = %request_id, verb = %verb, error = %e, "Command dispatch failed");
            -(Errno::EINVAL as i64)
        }
        Err(e) => {
            error!(request_id = %request_id, verb = %verb, error = %e, "Command task panicked");
            -(Errno::EIO as i64)
        }
    };

    info!(
        request_id = %request_id,
        verb = %verb,
        result = code,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics.record_request(code >= 0);

    write_result_with_timeout(writer, code, socket_timeout).await?;

    Ok(())
}

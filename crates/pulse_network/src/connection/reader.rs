//! Per-connection read loop: frames in, channel messages out.

use super::Session;
use crate::channel::{Channel, ChannelMessage, ChannelQueueMap};
use crate::error::NetworkError;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, trace, warn};

/// Reads newline-delimited frames until the peer disconnects or the session
/// is closed.
///
/// Each frame is decoded with the protocol that is active at the moment it is
/// read and offered to the network channel. Without auto-read the reader parks
/// before every frame until the tick requests a read, which it only does once
/// the previous frame has been dispatched. Frames that the protocol rejects
/// are dropped; malformed or over-long lines end the connection.
pub(crate) async fn read_frames<R>(
    io: R,
    session: Arc<Session>,
    queues: Arc<ChannelQueueMap>,
    max_frame_length: usize,
) -> Result<(), NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(io, LinesCodec::new_with_max_length(max_frame_length));

    loop {
        if !session.is_auto_read() {
            tokio::select! {
                _ = session.read_requested() => {}
                _ = session.closed() => break,
            }
        }

        let line = tokio::select! {
            line = frames.next() => line,
            _ = session.closed() => break,
        };

        let line = match line {
            Some(line) => line?,
            None => {
                debug!("Session {} reached end of stream", session.id());
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let protocol = session.protocol();
        let message = match protocol.decode(&line) {
            Ok(message) => message,
            Err(NetworkError::Decode(e)) => return Err(NetworkError::Decode(e)),
            Err(e) => {
                warn!("Dropping frame from session {}: {}", session.id(), e);
                continue;
            }
        };

        trace!(
            "Session {} read {} under {}",
            session.id(),
            message.as_ref().message_name(),
            protocol
        );

        let message = ChannelMessage::new(Channel::Network, session.clone(), message);
        session.frame_offered();
        if let Err(e) = queues.offer(Channel::Network, message) {
            session.frame_dispatched();
            warn!("Dropping frame from session {}: {}", session.id(), e);
        }
    }

    Ok(())
}

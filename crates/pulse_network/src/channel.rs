//! Per-channel message queues between connection readers and the tick.
//!
//! Any number of reader tasks [`offer`](ChannelQueueMap::offer) decoded
//! messages; the tick is the single consumer and empties a channel once per
//! tick with [`drain`](ChannelQueueMap::drain). Queues are created for every
//! [`Channel`] up front and live as long as the map.

use crate::connection::Session;
use crate::error::NetworkError;
use crate::messaging::Message;
use crossbeam::queue::{ArrayQueue, SegQueue};
use std::fmt;
use std::sync::Arc;

/// Logical stream of inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Protocol traffic from client connections
    Network,
}

impl Channel {
    pub const COUNT: usize = 1;

    /// Every channel, in queue order.
    pub const ALL: [Channel; Channel::COUNT] = [Channel::Network];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Network => write!(f, "network"),
        }
    }
}

/// A message together with where it came from.
///
/// Created by the connection reader, consumed exactly once by the dispatcher.
#[derive(Debug)]
pub struct ChannelMessage {
    channel: Channel,
    session: Arc<Session>,
    message: Box<dyn Message>,
}

impl ChannelMessage {
    pub fn new(channel: Channel, session: Arc<Session>, message: Box<dyn Message>) -> Self {
        Self {
            channel,
            session,
            message,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The session the message was read from.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }
}

enum ChannelQueue {
    Unbounded(SegQueue<ChannelMessage>),
    Bounded(ArrayQueue<ChannelMessage>),
}

impl ChannelQueue {
    fn new(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => ChannelQueue::Bounded(ArrayQueue::new(capacity.max(1))),
            None => ChannelQueue::Unbounded(SegQueue::new()),
        }
    }

    fn push(&self, message: ChannelMessage) -> Result<(), ChannelMessage> {
        match self {
            ChannelQueue::Unbounded(queue) => {
                queue.push(message);
                Ok(())
            }
            ChannelQueue::Bounded(queue) => queue.push(message),
        }
    }

    fn pop(&self) -> Option<ChannelMessage> {
        match self {
            ChannelQueue::Unbounded(queue) => queue.pop(),
            ChannelQueue::Bounded(queue) => queue.pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            ChannelQueue::Unbounded(queue) => queue.len(),
            ChannelQueue::Bounded(queue) => queue.len(),
        }
    }
}

/// One lock-free FIFO queue per [`Channel`].
pub struct ChannelQueueMap {
    queues: [ChannelQueue; Channel::COUNT],
    capacity: Option<usize>,
}

impl ChannelQueueMap {
    /// Creates the queues. `None` makes them unbounded; `Some(n)` caps each
    /// channel at `n` pending messages and rejects further offers.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            queues: Channel::ALL.map(|_| ChannelQueue::new(capacity)),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    fn queue(&self, channel: Channel) -> &ChannelQueue {
        &self.queues[channel.index()]
    }

    /// Appends a message to a channel. Never blocks.
    pub fn offer(&self, channel: Channel, message: ChannelMessage) -> Result<(), NetworkError> {
        self.queue(channel)
            .push(message)
            .map_err(|_| NetworkError::ChannelFull(channel))
    }

    /// Removes and yields the messages pending on `channel`, oldest first.
    ///
    /// The drain stops after the number of messages present when it was
    /// created; anything offered while draining waits for the next drain.
    pub fn drain(&self, channel: Channel) -> Drain<'_> {
        let queue = self.queue(channel);
        Drain {
            queue,
            remaining: queue.len(),
        }
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.queue(channel).len()
    }

    pub fn is_empty(&self, channel: Channel) -> bool {
        self.len(channel) == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for ChannelQueueMap {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for ChannelQueueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for channel in Channel::ALL {
            map.entry(&channel, &self.len(channel));
        }
        map.finish()
    }
}

/// Destructive iterator returned by [`ChannelQueueMap::drain`].
pub struct Drain<'a> {
    queue: &'a ChannelQueue,
    remaining: usize,
}

impl Iterator for Drain<'_> {
    type Item = ChannelMessage;

    fn next(&mut self) -> Option<ChannelMessage> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.queue.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

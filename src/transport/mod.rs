// Instance-side transport abstraction

mod local;

pub use local::{LocalRelay, LocalTransport};

use crate::protocol::{ClientMessage, ServerMessage};
use std::collections::VecDeque;
use std::fmt;

/// Transport errors
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The connection to the relay is gone
    Disconnected,
    /// The message could not be encoded for the wire
    Encode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Disconnected => write!(f, "transport disconnected"),
            TransportError::Encode(e) => write!(f, "failed to encode message: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// Best-effort message channel to the relay.
///
/// No delivery or cross-kind ordering guarantee is assumed; everything the
/// core applies from it is idempotent.
pub trait Transport {
    fn send(&mut self, msg: ClientMessage) -> Result<(), TransportError>;

    /// Non-blocking receive of one inbound message
    fn try_recv(&mut self) -> Option<ServerMessage>;
}

/// Inbound messages collected once per tick and handled in arrival order
#[derive(Debug, Default)]
pub struct InboundQueue {
    queue: VecDeque<ServerMessage>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Pull everything currently available from the transport
    pub fn fill_from<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut count = 0;
        while let Some(msg) = transport.try_recv() {
            self.queue.push_back(msg);
            count += 1;
        }
        count
    }

    pub fn push(&mut self, msg: ServerMessage) {
        self.queue.push_back(msg);
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, ServerMessage> {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

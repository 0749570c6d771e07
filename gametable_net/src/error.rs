// Error types for the net crate.
//
// `DispatchError` is what handling one inbound packet can produce. The node
// loop sorts it into three buckets: fatal (close the connection now),
// protocol fault (count it against the connection's budget), and data fault
// (log and drop the one message). A corrupted element is a data fault that
// still counts, so a peer cannot stream them forever. `NetError` covers node startup and the
// `NodeHandle` API.

use std::io;

use gametable_protocol::{CodecError, MessageKind};
use gametable_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown message tag {tag}")]
    UnknownTag { tag: u32 },

    #[error("no handler registered for {0:?}")]
    Unregistered(MessageKind),

    #[error("malformed packet: {0}")]
    Codec(#[from] CodecError),

    #[error("{kind:?} not expected here: {reason}")]
    Unexpected {
        kind: MessageKind,
        reason: &'static str,
    },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl DispatchError {
    /// Errors after which the connection cannot be trusted to stay in step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownTag { .. }
                | DispatchError::Unregistered(_)
                | DispatchError::Handshake(_)
        )
    }

    /// Errors that count against a connection's fault budget.
    pub fn is_protocol_fault(&self) -> bool {
        matches!(
            self,
            DispatchError::Codec(_)
                | DispatchError::Unexpected { .. }
                | DispatchError::State(StateError::CorruptedElement(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode failed: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("node has stopped")]
    NodeStopped,
}

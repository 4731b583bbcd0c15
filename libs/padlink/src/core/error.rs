// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use crate::core::pads::PadRefError;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Unknown pad: {0}")]
    UnknownPad(String),

    #[error("Pad {pad} is declared as {declared}, but was linked as {requested}")]
    PadDirectionMismatch {
        pad: String,
        declared: String,
        requested: String,
    },

    #[error("Pad already linked: {0}")]
    PadAlreadyLinked(String),

    #[error("Incompatible flow control: {0}")]
    IncompatibleFlowControl(String),

    #[error("Static pad {0} cannot be unlinked while the element is not terminating")]
    StaticPadUnlink(String),

    #[error("Static pad {0} cannot be unlinked before being linked")]
    StaticPadNotLinked(String),

    #[error("Stream format rejected on pad {pad}: {format}")]
    StreamFormatRejected { pad: String, format: String },

    #[error("Buffer sent on pad {0} before any stream format")]
    BufferBeforeStreamFormat(String),

    #[error("End of stream violation on pad {0}")]
    EndOfStreamViolation(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Pad {pad} sent {size} units with only {demand} demanded")]
    DemandExceeded { pad: String, size: u64, demand: i64 },

    #[error(
        "Toilet overflow on pad {pad}: {unconsumed} unconsumed units exceed capacity {capacity}"
    )]
    ToiletOverflow {
        pad: String,
        unconsumed: i64,
        capacity: u64,
    },

    #[error("Callback {callback} failed: {reason}")]
    Callback { callback: String, reason: String },

    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StreamError {
    /// Whether the error must terminate the element that raised it.
    ///
    /// Configuration mistakes and resource exhaustion leave pad state that the
    /// element cannot safely continue with.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StreamError::Io(_) | StreamError::Other(_))
    }
}

impl From<PadRefError> for StreamError {
    fn from(e: PadRefError) -> Self {
        StreamError::Configuration(e.to_string())
    }
}

impl From<std::convert::Infallible> for StreamError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Failure of the cross-element call primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The peer's mailbox is closed or it did not answer within the bounded wait.
    #[error("call failure: {0}")]
    CallFailure(String),

    /// The peer accepted the request and died before replying.
    #[error("child dead: {0}")]
    ChildDead(String),
}

/// Outcome of a failed link handshake.
///
/// Peer unavailability and refusals are recoverable for the initiator: the
/// assembly layer decides whether to retry or abort. `Fatal` wraps local
/// configuration errors that already terminated the element raising them.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("neighbor {0} is dead")]
    NeighborDead(String),

    #[error("supervisor of neighbor {0} is dead")]
    NeighborChildDead(String),

    #[error("neighbor has no pad {0}")]
    UnknownPad(String),

    /// The neighbor rejected the link and was terminated for it.
    #[error("neighbor {element} refused the link: {source}")]
    NeighborRefused { element: String, source: StreamError },

    #[error(transparent)]
    Fatal(#[from] StreamError),
}

impl LinkError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LinkError::Fatal(_))
    }
}

use audio_backend::BackendError;
use thiserror::Error;

use crate::NodeId;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("audio context is closed")]
    Closed,
    #[error("unknown or freed node {0:?}")]
    UnknownNode(NodeId),
    #[error("connecting {from:?} -> {to:?} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },
    #[error("node {0:?} does not support this operation")]
    WrongKind(NodeId),
    #[error("buffer source {0:?} was already started")]
    AlreadyStarted(NodeId),
    #[error("platform does not support {0}")]
    Unsupported(&'static str),
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, GraphError>;

//! Error types for the highlight pipeline
//!
//! Scanning never fails, so nothing here covers it. Buffer-scoped errors
//! carry the id they concern; only [`EngineError::InitTimeout`] is global.

use std::time::Duration;

use thiserror::Error;

use crate::buffer::BufferId;

/// Why an [`Edit`](crate::buffer::Edit) or text mutation was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("start {start} is past end {end}")]
    Inverted { start: usize, end: usize },

    #[error("byte {offset} is out of bounds (len {len})")]
    OutOfBounds { offset: usize, len: usize },

    #[error("byte {offset} is not on a char boundary")]
    NotCharBoundary { offset: usize },

    #[error("{which} position {actual:?} does not match byte offset (expected {expected:?})")]
    PositionMismatch {
        which: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("new content does not match the old content outside the edited range")]
    ContentMismatch,
}

/// Failures surfaced by the registry, worker and client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("buffer {0} is not registered")]
    UnknownBuffer(BufferId),

    #[error("buffer {0} has been disposed")]
    BufferDisposed(BufferId),

    #[error("buffer {0} is already registered")]
    AlreadyRegistered(BufferId),

    #[error("edit rejected for buffer {buffer_id}: {reason}")]
    EditRejected { buffer_id: BufferId, reason: EditError },

    #[error("buffer {buffer_id} is at version {actual}, edit expected {expected}")]
    VersionMismatch {
        buffer_id: BufferId,
        expected: u64,
        actual: u64,
    },

    #[error("highlight worker not ready after {0:?}")]
    InitTimeout(Duration),

    #[error("highlight worker is gone")]
    WorkerUnavailable,
}

impl EngineError {
    /// The buffer this error concerns, if any
    pub fn buffer_id(&self) -> Option<BufferId> {
        match self {
            EngineError::UnknownBuffer(id)
            | EngineError::BufferDisposed(id)
            | EngineError::AlreadyRegistered(id) => Some(*id),
            EngineError::EditRejected { buffer_id, .. }
            | EngineError::VersionMismatch { buffer_id, .. } => Some(*buffer_id),
            EngineError::InitTimeout(_) | EngineError::WorkerUnavailable => None,
        }
    }

    /// Only initialization failures are fatal for the whole pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::InitTimeout(_) | EngineError::WorkerUnavailable
        )
    }
}

//! Open text buffers, their versions, and the edit path
//!
//! The registry is the single owner of buffer content and version counters.
//! Content and version only change through [`BufferRegistry::apply_edit`],
//! which validates the whole edit before touching anything.

pub mod edit;
mod line_index;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use edit::{diff, translate, translate_rope, Edit, Position, TextMutation};
pub use line_index::LineIndex;

use crate::error::EngineError;
use crate::syntax::LanguageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a registered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// No parse tree (no grammar for the filetype, or not parsed yet)
    Registered,
    Parsed,
    Disposed,
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub id: BufferId,
    /// Starts at 0, +1 per accepted edit
    pub version: u64,
    pub content: String,
    /// Filetype tag as given at registration
    pub filetype: String,
    pub language: LanguageId,
    pub state: BufferState,
}

impl Buffer {
    pub fn has_parser(&self) -> bool {
        self.state == BufferState::Parsed
    }

    pub fn is_disposed(&self) -> bool {
        self.state == BufferState::Disposed
    }
}

/// Table of open buffers keyed by id.
///
/// Disposed buffers are kept as tombstones so later requests report
/// "disposed" rather than "unknown", and so a disposed id is never reused.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: HashMap<BufferId, Buffer>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: BufferId,
        filetype: &str,
        content: String,
    ) -> Result<&Buffer, EngineError> {
        if let Some(existing) = self.buffers.get(&id) {
            return Err(if existing.is_disposed() {
                EngineError::BufferDisposed(id)
            } else {
                EngineError::AlreadyRegistered(id)
            });
        }

        let buffer = Buffer {
            id,
            version: 0,
            content,
            filetype: filetype.to_string(),
            language: LanguageId::from_filetype(filetype),
            state: BufferState::Registered,
        };
        tracing::debug!(
            "registered buffer {} ({}, {} bytes)",
            id,
            filetype,
            buffer.content.len()
        );
        Ok(self.buffers.entry(id).or_insert(buffer))
    }

    /// Live buffer lookup
    pub fn get(&self, id: BufferId) -> Result<&Buffer, EngineError> {
        match self.buffers.get(&id) {
            Some(buffer) if buffer.is_disposed() => Err(EngineError::BufferDisposed(id)),
            Some(buffer) => Ok(buffer),
            None => Err(EngineError::UnknownBuffer(id)),
        }
    }

    fn get_mut(&mut self, id: BufferId) -> Result<&mut Buffer, EngineError> {
        match self.buffers.get_mut(&id) {
            Some(buffer) if buffer.is_disposed() => Err(EngineError::BufferDisposed(id)),
            Some(buffer) => Ok(buffer),
            None => Err(EngineError::UnknownBuffer(id)),
        }
    }

    /// Validate and apply one edit, returning the new version.
    ///
    /// On any error the buffer keeps its content and version.
    pub fn apply_edit(
        &mut self,
        id: BufferId,
        edit: &Edit,
        new_content: String,
        expected_version: u64,
    ) -> Result<u64, EngineError> {
        let buffer = self.get_mut(id)?;
        if buffer.version != expected_version {
            return Err(EngineError::VersionMismatch {
                buffer_id: id,
                expected: expected_version,
                actual: buffer.version,
            });
        }
        edit.validate(&buffer.content, &new_content)
            .map_err(|reason| EngineError::EditRejected {
                buffer_id: id,
                reason,
            })?;

        buffer.content = new_content;
        buffer.version += 1;
        tracing::trace!("buffer {} now at version {}", id, buffer.version);
        Ok(buffer.version)
    }

    pub fn set_state(&mut self, id: BufferId, state: BufferState) -> Result<(), EngineError> {
        self.get_mut(id)?.state = state;
        Ok(())
    }

    /// Record that a parse tree now exists for the buffer
    pub fn mark_parsed(&mut self, id: BufferId) -> Result<(), EngineError> {
        self.set_state(id, BufferState::Parsed)
    }

    /// Mark a buffer disposed and release its content
    pub fn dispose(&mut self, id: BufferId) -> Result<(), EngineError> {
        let buffer = self.get_mut(id)?;
        buffer.state = BufferState::Disposed;
        buffer.content = String::new();
        tracing::debug!("disposed buffer {}", id);
        Ok(())
    }

    pub fn live_ids(&self) -> Vec<BufferId> {
        let mut ids: Vec<_> = self
            .buffers
            .values()
            .filter(|b| !b.is_disposed())
            .map(|b| b.id)
            .collect();
        ids.sort();
        ids
    }
}

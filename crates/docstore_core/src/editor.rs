//! Buffered, single-use batches of writes and removals.

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::processor::{PendingRecord, Processor};
use std::sync::Arc;
use tracing::debug;

/// State of an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// Accepting operations.
    Open,
    /// Committed; no further use.
    Committed,
    /// Dropped without committing; no further use.
    Disposed,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Records written.
    pub written: usize,
    /// Index entries removed.
    pub removed: usize,
}

/// Collects writes and removals and applies them in one locked unit.
///
/// Both serialized forms of a written entity are computed when it is
/// buffered, so encoding failures surface at the call site rather than at
/// commit time.
///
/// # Example
///
/// ```rust,ignore
/// let mut editor = db.edit()?;
/// editor.write(&note)?;
/// editor.remove_id(stale_id)?;
/// let summary = editor.commit()?;
/// ```
pub struct Editor<T: Entity> {
    processor: Arc<Processor<T>>,
    writes: Vec<PendingRecord>,
    removals: Vec<EntityId>,
    state: EditorState,
}

impl<T: Entity> Editor<T> {
    pub(crate) fn new(processor: Arc<Processor<T>>) -> Self {
        Self {
            processor,
            writes: Vec::new(),
            removals: Vec::new(),
            state: EditorState::Open,
        }
    }

    /// Returns the editor state.
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Buffers a write of `entity`.
    pub fn write(&mut self, entity: &T) -> CoreResult<()> {
        self.ensure_open()?;
        self.writes.push(PendingRecord::from_entity(entity)?);
        Ok(())
    }

    /// Buffers writes of every entity.
    ///
    /// If any entity fails to encode, none of them are buffered.
    pub fn write_range<'a, I>(&mut self, entities: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        self.ensure_open()?;
        let records = entities
            .into_iter()
            .map(PendingRecord::from_entity)
            .collect::<CoreResult<Vec<_>>>()?;
        self.writes.extend(records);
        Ok(())
    }

    /// Buffers removal of `entity`.
    pub fn remove(&mut self, entity: &T) -> CoreResult<()> {
        self.remove_id(entity.entity_id())
    }

    /// Buffers removal of the record with `id`.
    pub fn remove_id(&mut self, id: EntityId) -> CoreResult<()> {
        self.ensure_open()?;
        self.removals.push(id);
        Ok(())
    }

    /// Buffers removal of every entity.
    pub fn remove_range<'a, I>(&mut self, entities: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        self.ensure_open()?;
        self.removals
            .extend(entities.into_iter().map(Entity::entity_id));
        Ok(())
    }

    /// Number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Number of buffered removals.
    pub fn remove_count(&self) -> usize {
        self.removals.len()
    }

    /// Applies removals, then writes, then saves the index if configured.
    ///
    /// The editor cannot be used afterwards, whether the commit succeeded or
    /// not.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Disposed`] if the editor was already committed or
    /// disposed, and propagates processor failures.
    pub fn commit(&mut self) -> CoreResult<CommitSummary> {
        self.ensure_open()?;
        self.state = EditorState::Committed;

        let writes = std::mem::take(&mut self.writes);
        let removals = std::mem::take(&mut self.removals);
        if writes.is_empty() && removals.is_empty() {
            return Ok(CommitSummary::default());
        }

        let save_index = self.processor.config().save_index_on_commit;
        let summary = self.processor.while_locked(|guard| -> CoreResult<_> {
            let mut summary = CommitSummary::default();
            if !removals.is_empty() {
                summary.removed = guard.remove_data(&removals)?;
            }
            if !writes.is_empty() {
                guard.write_data(&writes)?;
                summary.written = writes.len();
            }
            if save_index {
                guard.save_index()?;
            }
            Ok(summary)
        })?;

        debug!(
            written = summary.written,
            removed = summary.removed,
            "committed editor"
        );
        Ok(summary)
    }

    /// Discards buffered operations. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == EditorState::Open {
            self.state = EditorState::Disposed;
        }
        self.writes.clear();
        self.removals.clear();
    }

    fn ensure_open(&self) -> CoreResult<()> {
        match self.state {
            EditorState::Open => Ok(()),
            EditorState::Committed | EditorState::Disposed => Err(CoreError::disposed("editor")),
        }
    }
}

impl<T: Entity> std::fmt::Debug for Editor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("writes", &self.writes.len())
            .field("removals", &self.removals.len())
            .field("state", &self.state)
            .finish()
    }
}

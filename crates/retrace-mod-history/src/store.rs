/// The two entry stacks and the entry lifecycle.
///
/// Both stacks keep the newest entry at the front. An entry lives in
/// exactly one stack; replay moves it across, and only a discard (redo
/// invalidation, clear, teardown) releases its record.
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::kind::UndoKind;
use crate::record::UndoRecord;

/// One recorded unit: a reversible edit or a group boundary.
pub struct UndoEntry {
    pub(crate) kind: UndoKind,
    pub(crate) timestamp: Duration,
    /// `None` marks a group sentinel.
    pub(crate) record: Option<Box<dyn UndoRecord>>,
}

impl UndoEntry {
    pub(crate) fn edit(kind: UndoKind, timestamp: Duration, record: Box<dyn UndoRecord>) -> Self {
        Self {
            kind,
            timestamp,
            record: Some(record),
        }
    }

    pub(crate) fn boundary(kind: UndoKind, timestamp: Duration) -> Self {
        Self {
            kind,
            timestamp,
            record: None,
        }
    }

    pub fn kind(&self) -> UndoKind {
        self.kind
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn is_boundary(&self) -> bool {
        self.record.is_none()
    }
}

impl Drop for UndoEntry {
    fn drop(&mut self) {
        if let Some(record) = self.record.as_mut() {
            record.release();
        }
    }
}

impl fmt::Debug for UndoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoEntry")
            .field("kind", &self.kind)
            .field("timestamp", &self.timestamp)
            .field("boundary", &self.is_boundary())
            .finish()
    }
}

/// Undo and redo stacks. Callers hold the manager lock.
#[derive(Debug, Default)]
pub struct ItemStore {
    pub(crate) undo: VecDeque<UndoEntry>,
    pub(crate) redo: VecDeque<UndoEntry>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `entry` to the undo stack and invalidates all redo history.
    pub(crate) fn push(&mut self, entry: UndoEntry) {
        self.undo.push_front(entry);
        if !self.redo.is_empty() {
            tracing::debug!("Discarding {} redo entries", self.redo.len());
            self.redo.clear();
        }
    }

    /// Removes every entry whose kind intersects `filter` from both stacks.
    /// Returns the number of entries discarded.
    pub(crate) fn clear_matching(&mut self, filter: UndoKind) -> usize {
        let before = self.len();
        self.undo.retain(|e| !e.kind.intersects(filter));
        self.redo.retain(|e| !e.kind.intersects(filter));
        before - self.len()
    }

    /// Empties both stacks. Returns the number of entries discarded.
    pub(crate) fn clear_all(&mut self) -> usize {
        let before = self.len();
        self.undo.clear();
        self.redo.clear();
        before
    }

    /// Visits matching non-boundary entries, undo stack first, newest first.
    pub fn iterate(&self, filter: UndoKind, mut visitor: impl FnMut(UndoKind, &dyn UndoRecord)) {
        for entry in self.undo.iter().chain(self.redo.iter()) {
            if !entry.kind.intersects(filter) {
                continue;
            }
            if let Some(record) = entry.record.as_deref() {
                visitor(entry.kind, record);
            }
        }
    }

    pub fn undo_entries(&self) -> impl Iterator<Item = &UndoEntry> {
        self.undo.iter()
    }

    pub fn redo_entries(&self) -> impl Iterator<Item = &UndoEntry> {
        self.redo.iter()
    }

    pub fn len(&self) -> usize {
        self.undo.len() + self.redo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

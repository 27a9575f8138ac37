/// Undo/redo replay: batch selection and transfer between stacks.
///
/// A replay picks the newest entry matching the filter and moves a batch
/// starting there to the opposite stack, calling `apply` on each edit.
///
/// - If the first match is a group sentinel, the batch is the whole group,
///   up to and including the closing sentinel.
/// - Otherwise the batch is a coalescing run: following entries join while
///   they match the filter and either sit inside a group or were stamped
///   within `window` of the first entry.
use std::collections::VecDeque;
use std::time::Duration;

use crate::kind::{UndoAction, UndoKind};
use crate::store::{ItemStore, UndoEntry};

/// Outcome of one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayBatch {
    /// Entries moved to the opposite stack, sentinels included.
    pub moved: usize,
    /// `apply` calls made.
    pub applied: usize,
}

impl ReplayBatch {
    /// Whether nothing matched; both stacks are then untouched.
    pub fn is_empty(&self) -> bool {
        self.moved == 0
    }
}

/// Replays one batch from the source stack of `action`.
pub fn replay(
    store: &mut ItemStore,
    filter: UndoKind,
    action: UndoAction,
    window: Duration,
) -> ReplayBatch {
    let (from, to) = match action {
        UndoAction::Undo => (&mut store.undo, &mut store.redo),
        UndoAction::Redo => (&mut store.redo, &mut store.undo),
    };

    let Some(pos) = from.iter().position(|e| e.kind.intersects(filter)) else {
        return ReplayBatch::default();
    };
    let Some(head) = from.remove(pos) else {
        return ReplayBatch::default();
    };

    if head.is_boundary() {
        replay_group(head, pos, from, to, action)
    } else {
        replay_run(head, pos, from, to, filter, action, window)
    }
}

fn replay_group(
    head: UndoEntry,
    pos: usize,
    from: &mut VecDeque<UndoEntry>,
    to: &mut VecDeque<UndoEntry>,
    action: UndoAction,
) -> ReplayBatch {
    tracing::trace!("Replaying group {} ({action})", head.kind);
    to.push_front(head);

    let mut batch = ReplayBatch {
        moved: 1,
        applied: 0,
    };
    while let Some(entry) = from.remove(pos) {
        let closed = apply_entry(entry, to, action, &mut batch);
        if closed {
            break;
        }
    }
    batch
}

fn replay_run(
    head: UndoEntry,
    pos: usize,
    from: &mut VecDeque<UndoEntry>,
    to: &mut VecDeque<UndoEntry>,
    filter: UndoKind,
    action: UndoAction,
    window: Duration,
) -> ReplayBatch {
    let first_ts = head.timestamp;
    let mut in_group = false;
    let mut batch = ReplayBatch::default();
    let mut entry = head;

    loop {
        if apply_entry(entry, to, action, &mut batch) {
            in_group = !in_group;
        }

        let joins = from.get(pos).is_some_and(|next| {
            next.kind.intersects(filter) && (in_group || gap(next.timestamp, first_ts) < window)
        });
        if !joins {
            break;
        }
        match from.remove(pos) {
            Some(next) => entry = next,
            None => break,
        }
    }
    batch
}

fn gap(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Applies `entry` unless it is a sentinel, then moves it to `to`.
/// Returns whether the entry was a sentinel.
fn apply_entry(
    mut entry: UndoEntry,
    to: &mut VecDeque<UndoEntry>,
    action: UndoAction,
    batch: &mut ReplayBatch,
) -> bool {
    let kind = entry.kind;
    let boundary = match entry.record.as_mut() {
        Some(record) => {
            tracing::trace!("Applying {kind} entry ({action})");
            record.apply(kind, action);
            batch.applied += 1;
            false
        }
        None => true,
    };
    to.push_front(entry);
    batch.moved += 1;
    boundary
}

/// Thread-safe undo/redo manager shared by editing subsystems.
///
/// Subsystems record reversible edits tagged with an `UndoKind`; user
/// actions replay them with a kind filter. Consecutive edits of the same
/// kind recorded within the coalescing window replay as one step, and
/// `begin_group`/`end_group` pairs replay atomically.
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::config::{ClearPolicy, HistoryConfig};
use crate::group::{Boundary, GroupTracker};
use crate::guard::ReplayGuard;
use crate::kind::{UndoAction, UndoKind};
use crate::record::{discard, UndoRecord};
use crate::replay::{replay, ReplayBatch};
use crate::store::{ItemStore, UndoEntry};

type RefreshHook = Box<dyn Fn(UndoAction) + Send + Sync>;

/// Owns the undo and redo stacks for one history.
///
/// Every stack access goes through a single non-reentrant lock. `apply`
/// callbacks run with that lock held: `record` and group calls made during
/// a replay are dropped, and any other call that needs the stacks is
/// refused when made from an `apply` callback.
pub struct UndoManager {
    store: Mutex<ItemStore>,
    /// Kept outside the stack lock so group calls from a callback never block.
    groups: Mutex<GroupTracker>,
    guard: ReplayGuard,
    clock: Box<dyn Clock>,
    config: HistoryConfig,
    refresh: Option<RefreshHook>,
}

impl fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("UndoManager");
        if let Some(store) = self.store_outside_replay("Debug") {
            debug
                .field("undo_len", &store.undo.len())
                .field("redo_len", &store.redo.len());
        }
        debug
            .field("group_depth", &self.group_depth())
            .field("guard", &self.guard)
            .field("config", &self.config)
            .finish()
    }
}

impl UndoManager {
    /// Creates an empty manager stamping entries with a monotonic clock.
    pub fn new(config: HistoryConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }

    /// Creates an empty manager with a custom time source.
    pub fn with_clock(config: HistoryConfig, clock: impl Clock + 'static) -> Self {
        Self {
            store: Mutex::new(ItemStore::new()),
            groups: Mutex::new(GroupTracker::new()),
            guard: ReplayGuard::new(),
            clock: Box::new(clock),
            config,
            refresh: None,
        }
    }

    /// Creates a manager with default config.
    pub fn in_memory() -> Self {
        Self::new(HistoryConfig::default())
    }

    /// Installs the hook notified once after every `perform` that ran,
    /// including ones that found nothing to replay.
    pub fn with_refresh_hook(mut self, hook: impl Fn(UndoAction) + Send + Sync + 'static) -> Self {
        self.refresh = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Records a reversible edit and invalidates all redo history.
    ///
    /// The record is released instead of stored when `disable_next_record`
    /// was armed (the flag is consumed) or when a replay is running.
    pub fn record(&self, kind: UndoKind, record: Box<dyn UndoRecord>) {
        if self.guard.take_suppression() {
            tracing::debug!("Suppressed {kind} record");
            discard(record);
            return;
        }
        if self.guard.is_replaying() {
            tracing::debug!("Dropped {kind} record issued during replay");
            discard(record);
            return;
        }

        // Stamp under the lock so timestamps never decrease in push order.
        let mut store = self.lock_store();
        let entry = UndoEntry::edit(kind, self.clock.now(), record);
        store.push(entry);
    }

    /// Arms a one-shot flag that makes the next `record` call a no-op.
    ///
    /// Group boundaries count as records: a `begin_group` or `end_group`
    /// that emits a sentinel consumes the flag instead.
    pub fn disable_next_record(&self) {
        self.guard.arm_suppression();
    }

    /// Opens a group, or nests into the one already open.
    ///
    /// Edits recorded until the outermost `end_group` replay as one unit.
    pub fn begin_group(&self, kind: UndoKind) {
        let boundary = self.lock_groups().begin(kind);
        if let Some(boundary) = boundary {
            self.push_boundary(boundary);
        }
    }

    /// Closes one nesting level, closing the group at the outermost level.
    ///
    /// # Panics
    ///
    /// Panics if no group is open.
    pub fn end_group(&self) {
        let boundary = self.lock_groups().end();
        if let Some(boundary) = boundary {
            self.push_boundary(boundary);
        }
    }

    pub fn is_group_open(&self) -> bool {
        self.lock_groups().is_open()
    }

    pub fn group_depth(&self) -> usize {
        self.lock_groups().depth()
    }

    /// Replays the newest batch matching `filter` in the given direction.
    ///
    /// An empty batch leaves both stacks untouched. The refresh hook runs
    /// after the lock is released, whether or not anything replayed.
    pub fn perform(&self, filter: UndoKind, action: UndoAction) -> ReplayBatch {
        let Some(mut store) = self.store_outside_replay(&action.to_string()) else {
            return ReplayBatch::default();
        };

        let batch = {
            let _replaying = self.guard.enter();
            replay(&mut store, filter, action, self.config.coalesce_window)
        };
        drop(store);

        if !batch.is_empty() {
            tracing::debug!(
                "{action} replayed {} entries ({} moved) for filter {filter}",
                batch.applied,
                batch.moved
            );
        }
        if let Some(refresh) = &self.refresh {
            refresh(action);
        }
        batch
    }

    pub fn undo(&self, filter: UndoKind) -> ReplayBatch {
        self.perform(filter, UndoAction::Undo)
    }

    pub fn redo(&self, filter: UndoKind) -> ReplayBatch {
        self.perform(filter, UndoAction::Redo)
    }

    /// Whether the undo stack holds an entry matching `filter`.
    pub fn can_undo(&self, filter: UndoKind) -> bool {
        self.store_outside_replay("can_undo")
            .is_some_and(|store| store.undo_entries().any(|e| e.kind().intersects(filter)))
    }

    /// Whether the redo stack holds an entry matching `filter`.
    pub fn can_redo(&self, filter: UndoKind) -> bool {
        self.store_outside_replay("can_redo")
            .is_some_and(|store| store.redo_entries().any(|e| e.kind().intersects(filter)))
    }

    /// Entries on the undo stack, sentinels included.
    pub fn undo_len(&self) -> usize {
        self.store_outside_replay("undo_len")
            .map_or(0, |store| store.undo.len())
    }

    /// Entries on the redo stack, sentinels included.
    pub fn redo_len(&self) -> usize {
        self.store_outside_replay("redo_len")
            .map_or(0, |store| store.redo.len())
    }

    /// Discards entries from both stacks, releasing their records.
    ///
    /// Which entries go depends on the configured `ClearPolicy`. Also
    /// disarms `disable_next_record`. Returns the number of entries
    /// discarded.
    pub fn clear(&self, filter: UndoKind) -> usize {
        let Some(mut store) = self.store_outside_replay("clear") else {
            return 0;
        };

        let discarded = match self.config.clear_policy {
            ClearPolicy::Matching => store.clear_matching(filter),
            ClearPolicy::Everything => store.clear_all(),
        };
        drop(store);
        self.guard.reset_suppression();
        tracing::debug!("Cleared {discarded} history entries for filter {filter}");
        discarded
    }

    /// Visits every matching edit, undo stack first, newest first.
    /// Group sentinels are skipped.
    pub fn iterate(&self, filter: UndoKind, visitor: impl FnMut(UndoKind, &dyn UndoRecord)) {
        if let Some(store) = self.store_outside_replay("iterate") {
            store.iterate(filter, visitor);
        }
    }

    /// Number of matching edits across both stacks.
    pub fn count(&self, filter: UndoKind) -> usize {
        let mut count = 0;
        self.iterate(filter, |_, _| count += 1);
        count
    }

    /// Releases every entry and consumes the manager.
    pub fn teardown(self) {
        let discarded = self.lock_store().clear_all();
        tracing::debug!("History torn down, {discarded} entries released");
    }

    fn push_boundary(&self, boundary: Boundary) {
        if self.guard.take_suppression() {
            tracing::debug!("Suppressed {} group boundary", boundary.kind());
            return;
        }
        if self.guard.is_replaying() {
            tracing::debug!("Dropped group boundary issued during replay");
            return;
        }
        let mut store = self.lock_store();
        let entry = UndoEntry::boundary(boundary.kind(), self.clock.now());
        store.push(entry);
    }

    /// The stack lock, or `None` when called from an `apply` callback on the
    /// replaying thread, which already holds it.
    fn store_outside_replay(&self, operation: &str) -> Option<MutexGuard<'_, ItemStore>> {
        if self.guard.is_replaying_here() {
            tracing::warn!("Ignoring {operation} requested from inside a replay callback");
            return None;
        }
        Some(self.lock_store())
    }

    /// A panicking callback poisons the lock; the stacks stay usable.
    fn lock_store(&self) -> MutexGuard<'_, ItemStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_groups(&self) -> MutexGuard<'_, GroupTracker> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Recording gates that sit next to the manager lock.
///
/// The lock itself only serializes access to the stacks. Whether a
/// `record` call is honored is decided here, before the lock is taken:
/// - a one-shot suppression flag swallows the next edit,
/// - the replay flag drops every edit recorded while a replay runs,
///   including edits recorded from inside `apply` callbacks.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Default)]
pub struct ReplayGuard {
    replaying: AtomicBool,
    replay_thread: Mutex<Option<ThreadId>>,
    suppress_next: AtomicBool,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a replay as running on the current thread until the returned
    /// scope is dropped, including during unwinding.
    pub fn enter(&self) -> ReplayScope<'_> {
        *self
            .replay_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        self.replaying.store(true, Ordering::SeqCst);
        ReplayScope { guard: self }
    }

    /// Whether a replay is running on any thread.
    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    /// Whether the calling thread is inside a replay, i.e. running an
    /// `apply` callback.
    pub fn is_replaying_here(&self) -> bool {
        self.is_replaying()
            && *self
                .replay_thread
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                == Some(thread::current().id())
    }

    pub fn arm_suppression(&self) {
        self.suppress_next.store(true, Ordering::SeqCst);
    }

    /// Consumes the suppression flag. Returns whether it was armed.
    pub fn take_suppression(&self) -> bool {
        self.suppress_next.swap(false, Ordering::SeqCst)
    }

    pub fn reset_suppression(&self) {
        self.suppress_next.store(false, Ordering::SeqCst);
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress_next.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayGuard")
            .field("replaying", &self.is_replaying())
            .field("suppress_next", &self.is_suppressing())
            .finish()
    }
}

/// Clears the replay flag on drop.
pub struct ReplayScope<'a> {
    guard: &'a ReplayGuard,
}

impl Drop for ReplayScope<'_> {
    fn drop(&mut self) {
        self.guard.replaying.store(false, Ordering::SeqCst);
        *self
            .guard
            .replay_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

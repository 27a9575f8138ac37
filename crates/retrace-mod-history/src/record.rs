/// Reversible payloads registered by editing subsystems.
use std::any::Any;
use std::fmt;

use crate::kind::{UndoAction, UndoKind};

/// A reversible edit owned by the history once recorded.
///
/// `apply` is called on every replay with the direction to move the edited
/// state in. The record is never consumed by a replay: it moves to the
/// opposite stack and can be replayed again.
///
/// `release` is called exactly once when the history discards the record
/// without replaying it (redo invalidation, clear, suppression, teardown).
/// Implementations must not call back into the `UndoManager` from either
/// method.
pub trait UndoRecord: Send {
    fn apply(&mut self, kind: UndoKind, action: UndoAction);

    fn release(&mut self) {}

    /// Access for downcasting from `UndoManager::iterate` visitors.
    fn as_any(&self) -> &dyn Any;
}

type ApplyFn<C, P> = Box<dyn FnMut(&C, UndoKind, &mut P, UndoAction) + Send>;
type ReleaseFn<P> = Box<dyn FnOnce(P) + Send>;

/// Callback-shaped record: an owner context handed back on every replay,
/// a payload owned by the history, and an optional payload destructor.
///
/// Lets a subsystem register plain functions instead of implementing
/// `UndoRecord` on its own type.
pub struct CallbackRecord<C, P> {
    owner: C,
    payload: Option<P>,
    apply: ApplyFn<C, P>,
    release: Option<ReleaseFn<P>>,
}

impl<C, P> CallbackRecord<C, P>
where
    C: Send + 'static,
    P: Send + 'static,
{
    pub fn new(
        owner: C,
        payload: P,
        apply: impl FnMut(&C, UndoKind, &mut P, UndoAction) + Send + 'static,
    ) -> Self {
        Self {
            owner,
            payload: Some(payload),
            apply: Box::new(apply),
            release: None,
        }
    }

    /// Sets the destructor run on the payload when the record is discarded.
    pub fn with_release(mut self, release: impl FnOnce(P) + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn owner(&self) -> &C {
        &self.owner
    }

    /// The payload, or `None` once released.
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn boxed(self) -> Box<dyn UndoRecord> {
        Box::new(self)
    }
}

impl<C, P> UndoRecord for CallbackRecord<C, P>
where
    C: Send + 'static,
    P: Send + 'static,
{
    fn apply(&mut self, kind: UndoKind, action: UndoAction) {
        if let Some(payload) = self.payload.as_mut() {
            (self.apply)(&self.owner, kind, payload, action);
        }
    }

    fn release(&mut self) {
        let payload = self.payload.take();
        if let (Some(payload), Some(release)) = (payload, self.release.take()) {
            release(payload);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<C, P> fmt::Debug for CallbackRecord<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRecord")
            .field("has_payload", &self.payload.is_some())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// Releases a record that never made it into a stack.
pub(crate) fn discard(mut record: Box<dyn UndoRecord>) {
    record.release();
}

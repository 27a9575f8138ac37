/// Transaction nesting state.
///
/// Only the outermost `begin`/`end` pair produces boundary entries; nested
/// pairs just move the depth counter, so stored groups never nest.
use crate::kind::UndoKind;

/// What the caller must record after a tracker transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Record an opening sentinel of this kind.
    Open(UndoKind),
    /// Record a closing sentinel of this kind.
    Close(UndoKind),
}

impl Boundary {
    pub fn kind(self) -> UndoKind {
        match self {
            Self::Open(kind) | Self::Close(kind) => kind,
        }
    }
}

#[derive(Debug, Default)]
pub struct GroupTracker {
    kind: UndoKind,
    depth: usize,
}

impl GroupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a group, or nests into the open one.
    pub fn begin(&mut self, kind: UndoKind) -> Option<Boundary> {
        if self.depth == 0 {
            self.kind = kind;
            self.depth = 1;
            Some(Boundary::Open(kind))
        } else {
            self.depth += 1;
            None
        }
    }

    /// Closes one nesting level.
    ///
    /// # Panics
    ///
    /// Panics if no group is open.
    pub fn end(&mut self) -> Option<Boundary> {
        assert!(self.depth > 0, "end_group called without a matching begin_group");
        self.depth -= 1;
        if self.depth == 0 {
            let kind = std::mem::take(&mut self.kind);
            Some(Boundary::Close(kind))
        } else {
            None
        }
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Kind of the open group, `UndoKind::NONE` when closed.
    pub fn kind(&self) -> UndoKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: UndoKind = UndoKind::bit(4);
    const OTHER: UndoKind = UndoKind::bit(5);

    #[test]
    fn test_single_group() {
        let mut tracker = GroupTracker::new();
        assert_eq!(tracker.begin(K), Some(Boundary::Open(K)));
        assert!(tracker.is_open());
        assert_eq!(tracker.end(), Some(Boundary::Close(K)));
        assert!(!tracker.is_open());
        assert!(tracker.kind().is_none());
    }

    #[test]
    fn test_nested_groups_flatten() {
        let mut tracker = GroupTracker::new();
        assert!(tracker.begin(K).is_some());
        assert_eq!(tracker.begin(OTHER), None);
        assert_eq!(tracker.depth(), 2);
        assert_eq!(tracker.end(), None);
        // Closing sentinel carries the outermost kind.
        assert_eq!(tracker.end(), Some(Boundary::Close(K)));
    }

    #[test]
    #[should_panic(expected = "without a matching begin_group")]
    fn test_end_without_begin_panics() {
        GroupTracker::new().end();
    }
}

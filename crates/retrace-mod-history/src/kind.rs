/// Entry categories and replay direction.
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask tag identifying which subsystem an undo entry belongs to.
///
/// Each editing subsystem owns one or more bits. Filters passed to
/// `perform`, `clear` and `iterate` are themselves `UndoKind` masks and
/// select every entry sharing at least one bit with the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UndoKind(u32);

impl UndoKind {
    /// Matches nothing. Also the kind of "no open group".
    pub const NONE: Self = Self(0);
    /// Matches every kind.
    pub const ALL: Self = Self(u32::MAX);

    /// Creates a kind from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Creates a single-bit kind. `n` must be below 32.
    pub const fn bit(n: u32) -> Self {
        assert!(n < 32, "undo kinds are limited to 32 bits");
        Self(1 << n)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether this kind shares at least one bit with `filter`.
    pub const fn intersects(self, filter: Self) -> bool {
        self.0 & filter.0 != 0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for UndoKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for UndoKind {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for UndoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Direction of a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UndoAction {
    Undo,
    Redo,
}

impl UndoAction {
    /// The opposite direction.
    pub fn inverse(self) -> Self {
        match self {
            Self::Undo => Self::Redo,
            Self::Redo => Self::Undo,
        }
    }
}

impl fmt::Display for UndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undo => f.write_str("undo"),
            Self::Redo => f.write_str("redo"),
        }
    }
}

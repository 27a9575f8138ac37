/// In-memory undo/redo history shared by independent editing subsystems.
///
/// Provides an `UndoManager` that records type-tagged reversible edits on
/// an undo stack, replays them in either direction with kind filters,
/// groups nested transactions into atomic steps and coalesces bursts of
/// same-kind edits recorded within a short time window.
pub mod clock;
pub mod config;
pub mod group;
pub mod guard;
pub mod kind;
pub mod manager;
pub mod record;
pub mod replay;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClearPolicy, HistoryConfig};
pub use kind::{UndoAction, UndoKind};
pub use manager::UndoManager;
pub use record::{CallbackRecord, UndoRecord};
pub use replay::ReplayBatch;

/// Toy key/value document edited by scripts.
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use retrace_mod_history::{UndoAction, UndoKind, UndoRecord};

/// Shared handle to the document values. Clones edit the same document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    values: Arc<Mutex<BTreeMap<String, i64>>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.values().get(key).copied()
    }

    /// Sets `key`, or removes it when `value` is `None`.
    pub fn set(&self, key: &str, value: Option<i64>) {
        let mut values = self.values();
        match value {
            Some(value) => {
                values.insert(key.to_string(), value);
            }
            None => {
                values.remove(key);
            }
        }
    }

    /// Renders the document as `key=value` pairs in key order.
    pub fn render(&self) -> String {
        let values = self.values();
        if values.is_empty() {
            return "(empty)".to_string();
        }
        values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, i64>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Undo record for one `set`: restores `before` on undo, `after` on redo.
#[derive(Debug)]
pub struct ValueChange {
    document: Document,
    key: String,
    before: Option<i64>,
    after: i64,
}

impl ValueChange {
    /// Applies the new value to `document` and returns the record that
    /// reverses it.
    pub fn set(document: &Document, key: &str, value: i64) -> Self {
        let before = document.get(key);
        document.set(key, Some(value));
        Self {
            document: document.clone(),
            key: key.to_string(),
            before,
            after: value,
        }
    }

    pub fn describe(&self) -> String {
        match self.before {
            Some(before) => format!("{}: {before} -> {}", self.key, self.after),
            None => format!("{}: unset -> {}", self.key, self.after),
        }
    }
}

impl UndoRecord for ValueChange {
    fn apply(&mut self, _kind: UndoKind, action: UndoAction) {
        match action {
            UndoAction::Undo => self.document.set(&self.key, self.before),
            UndoAction::Redo => self.document.set(&self.key, Some(self.after)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

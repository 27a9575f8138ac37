/// Edit scripts: JSON step lists replayed against a document and history.
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use retrace_mod_history::{HistoryConfig, ManualClock, UndoAction, UndoKind, UndoManager};
use serde::Deserialize;

use crate::document::{Document, ValueChange};

/// Name that selects every kind in a filter.
const ALL_KINDS: &str = "all";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid script {}", path.display()))
    }

    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse script JSON")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Set `key` to `value`, recording an undoable change of `kind`.
    Set { kind: String, key: String, value: i64 },
    BeginGroup { kind: String },
    EndGroup,
    /// Advance the history clock.
    Wait { ms: u64 },
    Undo {
        #[serde(default)]
        filter: Vec<String>,
    },
    Redo {
        #[serde(default)]
        filter: Vec<String>,
    },
    Clear {
        #[serde(default)]
        filter: Vec<String>,
    },
    DisableNext,
    /// Emit the document and history listing.
    Print,
}

/// Assigns one bit per kind name, in order of first use.
#[derive(Debug, Default)]
pub struct KindRegistry {
    names: Vec<String>,
}

impl KindRegistry {
    pub fn kind(&mut self, name: &str) -> Result<UndoKind> {
        if name == ALL_KINDS {
            return Ok(UndoKind::ALL);
        }
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            return Ok(UndoKind::bit(pos as u32));
        }
        if self.names.len() >= 32 {
            bail!("Too many kinds: cannot assign a bit to '{name}'");
        }
        self.names.push(name.to_string());
        Ok(UndoKind::bit((self.names.len() - 1) as u32))
    }

    /// Combines named kinds. An empty list selects everything.
    pub fn filter(&mut self, names: &[String]) -> Result<UndoKind> {
        if names.is_empty() {
            return Ok(UndoKind::ALL);
        }
        let mut filter = UndoKind::NONE;
        for name in names {
            filter |= self.kind(name)?;
        }
        Ok(filter)
    }

    /// Names of the registered kinds present in `kind`.
    pub fn describe(&self, kind: UndoKind) -> String {
        let names: Vec<&str> = self
            .names
            .iter()
            .enumerate()
            .filter(|(bit, _)| kind.intersects(UndoKind::bit(*bit as u32)))
            .map(|(_, name)| name.as_str())
            .collect();
        if names.is_empty() {
            kind.to_string()
        } else {
            names.join("|")
        }
    }
}

/// A document, its history and the output collected while running steps.
pub struct Session {
    document: Document,
    history: UndoManager,
    clock: ManualClock,
    kinds: KindRegistry,
    refreshes: Arc<AtomicUsize>,
    output: Vec<String>,
}

impl Session {
    pub fn new(config: HistoryConfig) -> Self {
        let clock = ManualClock::new();
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&refreshes);
        let history = UndoManager::with_clock(config, clock.clone())
            .with_refresh_hook(move |action| {
                counter.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Document refreshed after {action}");
            });
        Self {
            document: Document::new(),
            history,
            clock,
            kinds: KindRegistry::default(),
            refreshes,
            output: Vec::new(),
        }
    }

    pub fn run(&mut self, script: &Script) -> Result<()> {
        for (index, step) in script.steps.iter().enumerate() {
            self.step(step)
                .with_context(|| format!("Step {} ({step:?}) failed", index + 1))?;
        }
        if self.history.is_group_open() {
            let depth = self.history.group_depth();
            tracing::warn!("Script ended with {depth} open group level(s)");
        }
        Ok(())
    }

    pub fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Set { kind, key, value } => {
                let kind = self.kinds.kind(kind)?;
                let change = ValueChange::set(&self.document, key, *value);
                self.history.record(kind, Box::new(change));
            }
            Step::BeginGroup { kind } => {
                let kind = self.kinds.kind(kind)?;
                self.history.begin_group(kind);
            }
            Step::EndGroup => {
                if !self.history.is_group_open() {
                    bail!("end_group without a matching begin_group");
                }
                self.history.end_group();
            }
            Step::Wait { ms } => self.clock.advance(Duration::from_millis(*ms)),
            Step::Undo { filter } => self.replay(filter, UndoAction::Undo)?,
            Step::Redo { filter } => self.replay(filter, UndoAction::Redo)?,
            Step::Clear { filter } => {
                let filter = self.kinds.filter(filter)?;
                let discarded = self.history.clear(filter);
                self.output.push(format!("clear: {discarded} entries discarded"));
            }
            Step::DisableNext => self.history.disable_next_record(),
            Step::Print => self.print(),
        }
        Ok(())
    }

    fn replay(&mut self, filter: &[String], action: UndoAction) -> Result<()> {
        let filter = self.kinds.filter(filter)?;
        let batch = self.history.perform(filter, action);
        if batch.is_empty() {
            self.output.push(format!("{action}: nothing to {action}"));
        } else {
            self.output.push(format!(
                "{action}: {} change(s) -> {}",
                batch.applied,
                self.document.render()
            ));
        }
        Ok(())
    }

    fn print(&mut self) {
        self.output.push(format!("document: {}", self.document.render()));
        self.output.push(format!(
            "history: {} undo / {} redo entries, {} refreshes",
            self.history.undo_len(),
            self.history.redo_len(),
            self.refreshes()
        ));
        let kinds = &self.kinds;
        let output = &mut self.output;
        self.history.iterate(UndoKind::ALL, |kind, record| {
            if let Some(change) = record.as_any().downcast_ref::<ValueChange>() {
                output.push(format!("  [{}] {}", kinds.describe(kind), change.describe()));
            }
        });
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_mod_history::ClearPolicy;

    fn run(json: &str) -> Session {
        let script = Script::parse(json).expect("parse");
        let mut session = Session::new(HistoryConfig::default());
        session.run(&script).expect("run");
        session
    }

    #[test]
    fn test_parse_steps() {
        let script = Script::parse(
            r#"{"steps": [
                {"op": "set", "kind": "rating", "key": "img", "value": 3},
                {"op": "undo"},
                {"op": "redo", "filter": ["rating"]},
                {"op": "end_group"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(
            script.steps,
            vec![
                Step::Set {
                    kind: "rating".to_string(),
                    key: "img".to_string(),
                    value: 3
                },
                Step::Undo { filter: vec![] },
                Step::Redo {
                    filter: vec!["rating".to_string()]
                },
                Step::EndGroup,
            ]
        );
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        assert!(Script::parse(r#"{"steps": [{"op": "explode"}]}"#).is_err());
    }

    #[test]
    fn test_kind_registry_assigns_bits_in_order() {
        let mut kinds = KindRegistry::default();
        assert_eq!(kinds.kind("rating").unwrap(), UndoKind::bit(0));
        assert_eq!(kinds.kind("tags").unwrap(), UndoKind::bit(1));
        assert_eq!(kinds.kind("rating").unwrap(), UndoKind::bit(0));
        assert_eq!(kinds.kind("all").unwrap(), UndoKind::ALL);

        let filter = kinds
            .filter(&["tags".to_string(), "rating".to_string()])
            .unwrap();
        assert_eq!(filter, UndoKind::from_bits(0b11));
        assert_eq!(kinds.filter(&[]).unwrap(), UndoKind::ALL);
        assert_eq!(kinds.describe(filter), "rating|tags");
    }

    #[test]
    fn test_kind_registry_limit() {
        let mut kinds = KindRegistry::default();
        for i in 0..32 {
            kinds.kind(&format!("k{i}")).unwrap();
        }
        assert!(kinds.kind("one-too-many").is_err());
    }

    #[test]
    fn test_slider_drag_undoes_in_one_step() {
        let session = run(
            r#"{"steps": [
                {"op": "set", "kind": "exposure", "key": "ev", "value": 1},
                {"op": "wait", "ms": 1000},
                {"op": "set", "kind": "exposure", "key": "ev", "value": 2},
                {"op": "wait", "ms": 100},
                {"op": "set", "kind": "exposure", "key": "ev", "value": 3},
                {"op": "wait", "ms": 100},
                {"op": "set", "kind": "exposure", "key": "ev", "value": 4},
                {"op": "undo"}
            ]}"#,
        );
        assert_eq!(session.document().get("ev"), Some(1));
        assert_eq!(session.output(), ["undo: 3 change(s) -> ev=1"]);
        assert_eq!(session.refreshes(), 1);
    }

    #[test]
    fn test_group_and_filters() {
        let session = run(
            r#"{"steps": [
                {"op": "begin_group", "kind": "tags"},
                {"op": "set", "kind": "tags", "key": "a", "value": 1},
                {"op": "wait", "ms": 5000},
                {"op": "set", "kind": "tags", "key": "b", "value": 1},
                {"op": "end_group"},
                {"op": "wait", "ms": 5000},
                {"op": "set", "kind": "rating", "key": "r", "value": 5},
                {"op": "undo", "filter": ["tags"]},
                {"op": "print"}
            ]}"#,
        );
        assert_eq!(session.document().render(), "r=5");
        let output = session.output();
        assert_eq!(output[0], "undo: 2 change(s) -> r=5");
        assert_eq!(output[1], "document: r=5");
        assert_eq!(output[2], "history: 1 undo / 4 redo entries, 1 refreshes");
        assert_eq!(output[3], "  [rating] r: unset -> 5");
        assert_eq!(output.len(), 6);
    }

    #[test]
    fn test_disable_next_keeps_value_but_not_history() {
        let session = run(
            r#"{"steps": [
                {"op": "disable_next"},
                {"op": "set", "kind": "rating", "key": "r", "value": 2},
                {"op": "undo"}
            ]}"#,
        );
        assert_eq!(session.document().get("r"), Some(2));
        assert_eq!(session.output(), ["undo: nothing to undo"]);
    }

    #[test]
    fn test_clear_reports_discarded() {
        let script = Script::parse(
            r#"{"steps": [
                {"op": "set", "kind": "rating", "key": "r", "value": 2},
                {"op": "set", "kind": "tags", "key": "t", "value": 1},
                {"op": "clear", "filter": ["tags"]}
            ]}"#,
        )
        .unwrap();

        let mut matching = Session::new(HistoryConfig::default());
        matching.run(&script).unwrap();
        assert_eq!(matching.output(), ["clear: 1 entries discarded"]);

        let config = HistoryConfig::default().with_clear_policy(ClearPolicy::Everything);
        let mut everything = Session::new(config);
        everything.run(&script).unwrap();
        assert_eq!(everything.output(), ["clear: 2 entries discarded"]);
    }

    #[test]
    fn test_unbalanced_end_group_fails() {
        let script = Script::parse(r#"{"steps": [{"op": "end_group"}]}"#).unwrap();
        let mut session = Session::new(HistoryConfig::default());
        let err = session.run(&script).unwrap_err();
        assert!(format!("{err:#}").contains("without a matching begin_group"));
    }

    #[test]
    fn test_bundled_demo_script() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/slider_and_groups.json");
        let script = Script::load(&path).expect("demo script");
        let mut session = Session::new(HistoryConfig::default());
        session.run(&script).expect("run demo");

        assert_eq!(
            session.document().render(),
            "img-1/exposure=30, img-1/rating=3, img-1/tag:travel=1, \
             img-2/tag:travel=1, img-3/tag:travel=1"
        );
        assert!(session
            .output()
            .contains(&"clear: 1 entries discarded".to_string()));
        assert_eq!(session.refreshes(), 4);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"{"steps": [{"op": "print"}]}"#).unwrap();
        let script = Script::load(&path).unwrap();
        assert_eq!(script.steps, vec![Step::Print]);

        let missing = dir.path().join("missing.json");
        assert!(Script::load(&missing).is_err());
    }
}

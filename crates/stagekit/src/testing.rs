//! In-memory collaborators for tests and non-interactive embedding.

use crate::context::{LineReader, Params, Reporter, Translate};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

/// Kind of a recorded reporter call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Warn,
    Error,
    Step,
    Status,
}

/// One recorded reporter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub message: String,
}

/// Reporter that keeps every call in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    records: RefCell<Vec<Record>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, message: String) {
        self.records.borrow_mut().push(Record { level, message });
    }

    /// All calls in order
    pub fn records(&self) -> Vec<Record> {
        self.records.borrow().clone()
    }

    /// Messages recorded at `level`
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Warning messages
    pub fn warnings(&self) -> Vec<String> {
        self.messages(Level::Warn)
    }

    /// Check if any message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, msg: &str) {
        self.push(Level::Info, msg.to_string());
    }

    fn debug(&self, msg: &str) {
        self.push(Level::Debug, msg.to_string());
    }

    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg.to_string());
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg.to_string());
    }

    fn step(&self, index: usize, total: usize, label: &str) {
        self.push(Level::Step, format!("[{index}/{total}] {label}"));
    }

    fn status(&self, token: &str) {
        self.push(Level::Status, token.to_string());
    }
}

/// Translator that echoes the key, followed by its parameters if any
///
/// `t("a.b", &[("x", "1")])` renders as `a.b(x=1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyTranslator;

impl Translate for KeyTranslator {
    fn t(&self, key: &str, params: Params<'_>) -> String {
        if params.is_empty() {
            return key.to_string();
        }
        let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{key}({})", rendered.join(", "))
    }
}

/// Reader that replays a fixed script of answers
///
/// Once the script is exhausted every read fails with
/// [`io::ErrorKind::UnexpectedEof`], like a closed stdin.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    answers: RefCell<VecDeque<io::Result<String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedReader {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(|a| Ok(a.into())).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Reader whose first read is interrupted with Ctrl-C
    pub fn interrupted() -> Self {
        let reader = Self::default();
        reader.answers.borrow_mut().push_back(Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "read interrupted",
        )));
        reader
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&self, prompt: &str) -> io::Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::UnexpectedEof)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_translator() {
        assert_eq!(KeyTranslator.t("a.b", &[]), "a.b");
        assert_eq!(
            KeyTranslator.t("a.b", &[("x", "1"), ("y", "z")]),
            "a.b(x=1, y=z)"
        );
    }

    #[test]
    fn test_recording_reporter_levels() {
        let reporter = RecordingReporter::new();
        reporter.info("one");
        reporter.warn("two");
        reporter.step(1, 3, "label");
        reporter.status("DONE");

        assert_eq!(reporter.warnings(), vec!["two".to_string()]);
        assert!(reporter.contains(Level::Step, "[1/3] label"));
        assert_eq!(reporter.messages(Level::Status), vec!["DONE".to_string()]);
        assert_eq!(reporter.records().len(), 4);
    }
}

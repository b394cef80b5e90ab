//! Line-oriented YAML document editor.
//!
//! A [`Document`] keeps the original lines and only rewrites the ones that
//! hold an edited value. Comments, blank lines, key order, quoting of
//! untouched values and line endings survive a load/set/save cycle.

use crate::error::{Error, Result};
use crate::line::{self, Entry};
use crate::value::{Value, quote};
use std::fs;
use std::path::Path;

const MEMORY_ORIGIN: &str = "<memory>";
const BOM: char = '\u{feff}';

/// A YAML mapping document that can be edited in place
#[derive(Debug, Clone)]
pub struct Document {
    lines: Vec<String>,
    trailing_newline: bool,
    bom: bool,
    source: String,
    origin: String,
}

impl Document {
    /// Parse text held in memory
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_origin(text, MEMORY_ORIGIN)
    }

    /// Read and parse a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_with_origin(&text, &path.display().to_string())
    }

    fn parse_with_origin(source: &str, origin: &str) -> Result<Self> {
        let text = source.strip_prefix(BOM).unwrap_or(source);
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|source| Error::Malformed {
                origin: origin.to_string(),
                source,
            })?;

        if !matches!(parsed, serde_yaml::Value::Mapping(_) | serde_yaml::Value::Null) {
            return Err(Error::NotMapping(origin.to_string()));
        }

        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let trailing_newline = lines.last().is_some_and(String::is_empty);
        if trailing_newline {
            lines.pop();
        }

        Ok(Self {
            lines,
            trailing_newline,
            bom: text.len() != source.len(),
            source: source.to_string(),
            origin: origin.to_string(),
        })
    }

    /// Where the document came from (a path or `<memory>`)
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Text as it was loaded
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current text
    pub fn render(&self) -> String {
        let mut out = if self.bom { BOM.to_string() } else { String::new() };
        out.push_str(&self.lines.join("\n"));
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Check if the current text differs from what was loaded
    pub fn is_modified(&self) -> bool {
        self.render() != self.source
    }

    /// Write the current text to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, self.render()).map_err(write_err)
    }

    /// Inline value text of `key`, exactly as written
    ///
    /// Returns `None` when the key is missing, and an empty string when the
    /// value is a nested block.
    pub fn get(&self, key: &str) -> Option<String> {
        let idx = self.find(key)?;
        let line = line::body(&self.lines[idx]);
        let entry = line::parse_entry(line)?;
        Some(line[entry.value_start..entry.value_end].to_string())
    }

    /// Check if `key` resolves to an entry
    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Store `value` under `key`
    ///
    /// `key` is first looked up as a literal top-level key, then as a
    /// dotted path through nested mappings (`smtp.host` → `smtp:` →
    /// `host:`). A key found nowhere is appended as a literal top-level
    /// key. Any block previously held by the entry is replaced.
    ///
    /// Returns `true` if the text changed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<bool> {
        if key.is_empty() || key.contains(['\n', '\r']) {
            return Err(Error::InvalidKey(key.to_string()));
        }
        let rendered = value.into().render();

        match self.find(key) {
            Some(idx) => Ok(self.replace(idx, &rendered)),
            None => {
                self.append(key, &rendered);
                Ok(true)
            }
        }
    }

    fn replace(&mut self, idx: usize, rendered: &str) -> bool {
        let raw = &self.lines[idx];
        let cr = if raw.ends_with('\r') { "\r" } else { "" };
        let body = line::body(raw);
        let Some(entry) = line::parse_entry(body) else {
            return false;
        };

        let comment = entry.comment_start.map_or("", |start| &body[start..]);
        let properties = line::properties(&body[entry.value_start..entry.value_end]);
        let new_line = format!("{} {properties}{rendered}{comment}{cr}", &body[..entry.head_end]);

        let (start, end) = self.block_range(idx, &entry);
        if new_line == self.lines[idx] && start == end {
            return false;
        }

        self.lines.drain(start..end);
        self.lines[idx] = new_line;
        true
    }

    fn append(&mut self, key: &str, rendered: &str) {
        let cr = if self.lines.first().is_some_and(|l| l.ends_with('\r')) {
            "\r"
        } else {
            ""
        };
        let new_line = format!("{}: {rendered}{cr}", render_key(key));

        // An explicit empty mapping has to give way to the first entry
        let empty_flow = self
            .lines
            .iter()
            .position(|l| line::body(l).trim() == "{}");
        let only_trivia_besides = |skip: usize| {
            self.lines
                .iter()
                .enumerate()
                .all(|(i, l)| i == skip || line::is_trivia(l) || line::body(l).trim() == "---")
        };

        match empty_flow {
            Some(idx) if only_trivia_besides(idx) => self.lines[idx] = new_line,
            _ => self.lines.push(new_line),
        }
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.find_in(0, self.lines.len(), key)
    }

    /// Resolve `key` among the entries of the mapping spanning `start..end`
    fn find_in(&self, start: usize, end: usize, key: &str) -> Option<usize> {
        let children = self.children(start, end);

        if let Some((idx, _)) = children.iter().find(|(_, entry)| entry.key == key) {
            return Some(*idx);
        }

        for (idx, entry) in &children {
            let Some(rest) = key
                .strip_prefix(entry.key.as_str())
                .and_then(|r| r.strip_prefix('.'))
            else {
                continue;
            };
            if entry.has_inline_value() || rest.is_empty() {
                continue;
            }
            let (block_start, block_end) = self.block_range(*idx, entry);
            if let Some(found) = self.find_in(block_start, block_end, rest) {
                return Some(found);
            }
        }

        None
    }

    /// Entries at the shallowest indentation within `start..end`
    fn children(&self, start: usize, end: usize) -> Vec<(usize, Entry)> {
        let mut children = Vec::new();
        let mut level = None;
        let mut idx = start;

        while idx < end {
            if let Some(entry) = line::parse_entry(&self.lines[idx]) {
                let indent = *level.get_or_insert(entry.indent);
                if entry.indent == indent {
                    let (_, block_end) = self.block_range(idx, &entry);
                    children.push((idx, entry));
                    idx = block_end.max(idx + 1);
                    continue;
                }
                if entry.indent < indent {
                    break;
                }
            }
            idx += 1;
        }

        children
    }

    /// Lines owned by the entry at `idx`, excluding the entry line itself
    /// and any trailing blank or comment lines
    fn block_range(&self, idx: usize, entry: &Entry) -> (usize, usize) {
        let mut last = idx;
        for (offset, raw) in self.lines[idx + 1..].iter().enumerate() {
            if line::is_trivia(raw) {
                continue;
            }
            let indent = line::indent_of(line::body(raw));
            let owned = indent > entry.indent
                || (!entry.has_inline_value()
                    && indent == entry.indent
                    && line::is_seq_item(raw));
            if !owned {
                break;
            }
            last = idx + 1 + offset;
        }
        (idx + 1, last + 1)
    }
}

/// Write a key plainly when it is safe to, otherwise double-quoted
fn render_key(key: &str) -> String {
    let plain = key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))
        && !key.starts_with(['-', '.']);
    if plain { key.to_string() } else { quote(key) }
}

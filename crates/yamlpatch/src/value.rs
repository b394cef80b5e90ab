//! Scalar and flow values written by a patch.

use std::fmt::Write;

/// A value to store under a key
///
/// Only the shapes the installer writes are supported. Strings are always
/// emitted double-quoted and sequences always in flow style, which keeps
/// the output stable across repeated runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Double-quoted string
    Str(String),
    /// Plain integer
    Int(i64),
    /// Plain `true` / `false`
    Bool(bool),
    /// Flow sequence of double-quoted strings, e.g. `["mail"]`
    FlowSeq(Vec<String>),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn flow_seq<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FlowSeq(items.into_iter().map(Into::into).collect())
    }

    /// Render as inline YAML text
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => quote(s),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::FlowSeq(items) => {
                let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
                format!("[{}]", quoted.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Double-quote a string using YAML escapes
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

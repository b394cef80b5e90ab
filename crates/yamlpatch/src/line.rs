//! Recognizes block-mapping entry lines (`key: value  # comment`).
//!
//! Only the layout of a single line is inspected here; which lines belong
//! to which entry is decided by the document.

/// A `key: value` line split into its parts
///
/// All offsets are byte offsets into the line without its `\r`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    /// Leading spaces
    pub indent: usize,
    /// Key with quoting removed
    pub key: String,
    /// Offset just past the `:` separator
    pub head_end: usize,
    /// Inline value, trimmed
    pub value_start: usize,
    pub value_end: usize,
    /// Start of a trailing comment and the whitespace before it
    pub comment_start: Option<usize>,
}

impl Entry {
    /// Check if the value continues on the following lines
    pub fn has_inline_value(&self) -> bool {
        self.value_end > self.value_start
    }
}

/// Strip a trailing `\r`
pub(crate) fn body(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Number of leading spaces
pub(crate) fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Check if a line carries no content (blank or comment only)
pub(crate) fn is_trivia(line: &str) -> bool {
    let trimmed = body(line).trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Check if a line is a block sequence item
pub(crate) fn is_seq_item(line: &str) -> bool {
    let trimmed = body(line).trim_start();
    trimmed == "-" || trimmed.starts_with("- ")
}

/// Parse a mapping entry line, or `None` if the line is anything else
pub(crate) fn parse_entry(line: &str) -> Option<Entry> {
    let body = body(line);
    let indent = indent_of(body);
    let rest = &body[indent..];

    if rest.is_empty()
        || rest.starts_with(['#', '-', '[', '{', '?', '&', '*', '!', '|', '>', '%', '@', '`'])
        || rest.starts_with("...")
    {
        return None;
    }

    let (key, colon) = match rest.as_bytes()[0] {
        b'"' => quoted_key(rest, '"')?,
        b'\'' => quoted_key(rest, '\'')?,
        _ => plain_key(rest)?,
    };

    let head_end = indent + colon + 1;
    let (value_start, value_end, comment_start) = split_value(body, head_end);

    Some(Entry {
        indent,
        key,
        head_end,
        value_start,
        value_end,
        comment_start,
    })
}

/// Replace the inline value of an entry line with `mask` when `is_secret`
/// holds for its key
///
/// Any trailing comment is kept. Returns `None` for lines that are not
/// entries, carry no inline value or hold a key that is not secret.
pub fn mask_value(line: &str, mask: &str, is_secret: impl Fn(&str) -> bool) -> Option<String> {
    let body = body(line);
    let entry = parse_entry(body)?;
    if !entry.has_inline_value() || !is_secret(&entry.key) {
        return None;
    }
    Some(format!("{}{mask}{}", &body[..entry.value_start], &body[entry.value_end..]))
}

/// The `&anchor` / `!tag` properties leading a value, each followed by a
/// single space, so a replacement value can be written right after them
pub(crate) fn properties(value: &str) -> String {
    let mut out = String::new();
    let mut rest = value;
    while rest.starts_with(['&', '!']) {
        let token = rest.find([' ', '\t']).unwrap_or(rest.len());
        out.push_str(&rest[..token]);
        out.push(' ');
        rest = rest[token..].trim_start_matches([' ', '\t']);
    }
    out
}

/// Plain key: everything before the first `:` that is followed by a space
/// or the end of the line
fn plain_key(rest: &str) -> Option<(String, usize)> {
    let mut prev_space = false;
    for (i, c) in rest.char_indices() {
        match c {
            '#' if prev_space => return None,
            ':' => {
                let next = rest[i + 1..].chars().next();
                if next.is_none_or(|n| n == ' ' || n == '\t') {
                    let key = rest[..i].trim_end();
                    if key.is_empty() {
                        return None;
                    }
                    return Some((key.to_string(), i));
                }
            }
            _ => {}
        }
        prev_space = c == ' ' || c == '\t';
    }
    None
}

/// Quoted key followed by optional spaces and `:`
fn quoted_key(rest: &str, quote: char) -> Option<(String, usize)> {
    let mut key = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();
    let mut close = None;

    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            if let Some((_, escaped)) = chars.next() {
                key.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            }
            continue;
        }
        if c == quote {
            // '' is an escaped quote inside single quotes
            if quote == '\'' && chars.peek().is_some_and(|&(_, n)| n == '\'') {
                chars.next();
                key.push('\'');
                continue;
            }
            close = Some(i);
            break;
        }
        key.push(c);
    }

    let close = close?;
    let after = &rest[close + 1..];
    let gap = after.len() - after.trim_start_matches([' ', '\t']).len();
    let colon = close + 1 + gap;

    if !rest[colon..].starts_with(':') {
        return None;
    }
    let next = rest[colon + 1..].chars().next();
    if !next.is_none_or(|n| n == ' ' || n == '\t') {
        return None;
    }
    Some((key, colon))
}

/// Locate the inline value and a trailing comment after `head_end`
fn split_value(body: &str, head_end: usize) -> (usize, usize, Option<usize>) {
    let tail = &body[head_end..];
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut prev_space = true;
    let mut comment = None;

    for (i, c) in tail.char_indices() {
        if escaped {
            escaped = false;
            prev_space = false;
            continue;
        }
        match c {
            '\\' if in_double => escaped = true,
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            '#' if prev_space && !in_single && !in_double => {
                comment = Some(i);
                break;
            }
            _ => {}
        }
        prev_space = c == ' ' || c == '\t';
    }

    let value_region = &tail[..comment.unwrap_or(tail.len())];
    let lead = value_region.len() - value_region.trim_start().len();
    let content_end = head_end + value_region.trim_end().len();
    let value_start = head_end + lead;
    let value_end = content_end.max(value_start);

    let comment_start = comment.map(|_| content_end);
    (value_start, value_end, comment_start)
}

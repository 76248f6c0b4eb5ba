use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Highlighting category of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// Document type declaration
    StructuredComment,
    /// Tag names and tag brackets
    Keyword,
    Comment,
    /// Scriptlets and `${...}` expressions
    Annotation,
    /// Attribute values
    String,
}

/// Highlighted range: lines 1-indexed, columns 0-indexed in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub kind: HighlightKind,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

struct Channel {
    pattern: &'static Regex,
    kind: Option<HighlightKind>,
    /// Characters of the match left out of the span (the `=` of attributes)
    skip: usize,
}

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"^\s+").unwrap();
    static ref SERVER_COMMENT: Regex = Regex::new(r"^(?s)<%--.*?%>").unwrap();
    static ref MARKUP_COMMENT: Regex = Regex::new(r"^(?s)<!--.*?-->").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"^(?s)/\*.*?\*/").unwrap();
    static ref LINE_COMMENT: Regex = Regex::new(r"^//[^\n\r]*").unwrap();
    static ref DOCTYPE: Regex = Regex::new(r"^(?i)<!DOCTYPE[^>]*>").unwrap();
    static ref SCRIPTLET: Regex = Regex::new(r"^(?s)<%.*?%>").unwrap();
    static ref EL_EXPRESSION: Regex = Regex::new(r"^(?s)\$\{.*?\}").unwrap();
    static ref TAG_OPEN: Regex = Regex::new(r"^</?[:\w]+>?").unwrap();
    static ref TAG_CLOSE: Regex = Regex::new(r"^/?>").unwrap();
    static ref QUOTED_VALUE: Regex = Regex::new(r#"^(?s)=["'].*?["']"#).unwrap();
    static ref UNQUOTED_VALUE: Regex = Regex::new(r#"^=[^\s'"=<>`]+"#).unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"^\w+").unwrap();
    static ref LINE_BREAK: Regex = Regex::new(r"\r\n|\n|\r").unwrap();
}

fn channel(pattern: &'static Regex, kind: Option<HighlightKind>, skip: usize) -> Channel {
    Channel { pattern, kind, skip }
}

fn channels() -> [Channel; 12] {
    use HighlightKind::*;
    [
        channel(&SERVER_COMMENT, Some(Comment), 0),
        channel(&MARKUP_COMMENT, Some(Comment), 0),
        channel(&BLOCK_COMMENT, Some(Comment), 0),
        channel(&LINE_COMMENT, Some(Comment), 0),
        channel(&DOCTYPE, Some(StructuredComment), 0),
        channel(&SCRIPTLET, Some(Annotation), 0),
        channel(&EL_EXPRESSION, Some(Annotation), 0),
        channel(&TAG_OPEN, Some(Keyword), 0),
        channel(&TAG_CLOSE, Some(Keyword), 0),
        channel(&QUOTED_VALUE, Some(String), 1),
        channel(&UNQUOTED_VALUE, Some(String), 1),
        channel(&IDENTIFIER, None, 0),
    ]
}

/// Produce highlight spans for a page source
pub fn highlight(source: &str) -> Vec<Highlight> {
    let channels = channels();
    let mut highlights = Vec::new();
    let mut offset = 0;
    let mut line = 1;
    let mut col = 0;

    while offset < source.len() {
        let rest = &source[offset..];

        let matched = WHITESPACE
            .find(rest)
            .map(|m| (m.as_str(), None, 0))
            .or_else(|| {
                channels.iter().find_map(|c| c.pattern.find(rest).map(|m| (m.as_str(), c.kind, c.skip)))
            });

        // Unknown character: consume it without a span
        let (text, kind, skip) = match matched {
            Some(found) if !found.0.is_empty() => found,
            _ => {
                let len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                (&rest[..len], None, 0)
            }
        };

        if let Some(kind) = kind {
            let (end_line, end_col) = end_position(text, line, col);
            highlights.push(Highlight {
                kind,
                start_line: line,
                start_col: col + skip,
                end_line,
                end_col,
            });
        }

        (line, col) = end_position(text, line, col);
        offset += text.len();
    }

    highlights
}

/// Position right after `text` when it starts at (`line`, `col`)
fn end_position(text: &str, line: usize, col: usize) -> (usize, usize) {
    let lines: Vec<&str> = LINE_BREAK.split(text).collect();
    match lines.as_slice() {
        [single] => (line, col + single.chars().count()),
        [.., last] => (line + lines.len() - 1, last.chars().count()),
        [] => (line, col),
    }
}

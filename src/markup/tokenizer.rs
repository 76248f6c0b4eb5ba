//! Recognizer chain for server-page markup.
//!
//! At every cursor position the recognizers of a dialect are tried in order;
//! the first one that matches consumes a construct and emits one [`Node`].
//! Text is the catch-all and always consumes at least one character, so the
//! loop terminates on any input and the emitted nodes cover it without gaps.

use super::node::{Attribute, DirectiveData, DirectiveKind, Node, NodeData, Span, TagData};
use super::reader::CodeReader;
use memchr::memchr;
use tracing::trace;

/// One entry of the recognizer chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognizer {
    /// Delimited comment; the end delimiter is matched literally
    Comment { start: &'static str, end: &'static str, html: bool },
    /// `<!DOCTYPE ...>`
    Doctype { start: &'static str, end: &'static str },
    /// Processing instruction or page directive
    Directive { start: &'static str, end: &'static str, kind: DirectiveKind },
    /// Scriptlet or expression block
    Expression { start: &'static str, end: &'static str },
    /// Start, end or self-closing tag
    Element { start: &'static str, end: &'static str },
    /// Everything else
    Text,
}

/// Server-page dialect. The order is significant: longer delimiters sharing a
/// prefix must come first, and `Text` must be last.
pub const PAGE_RECOGNIZERS: &[Recognizer] = &[
    Recognizer::Comment { start: "<!--", end: "-->", html: true },
    Recognizer::Comment { start: "<%--", end: "--%>", html: false },
    Recognizer::Doctype { start: "<!DOCTYPE", end: ">" },
    Recognizer::Directive { start: "<?", end: "?>", kind: DirectiveKind::Processing },
    Recognizer::Directive { start: "<%@", end: "%>", kind: DirectiveKind::Page },
    Recognizer::Expression { start: "<%", end: "%>" },
    Recognizer::Element { start: "<", end: ">" },
    Recognizer::Text,
];

/// Plain markup without server-side constructs
pub const HTML_RECOGNIZERS: &[Recognizer] = &[
    Recognizer::Comment { start: "<!--", end: "-->", html: true },
    Recognizer::Doctype { start: "<!DOCTYPE", end: ">" },
    Recognizer::Directive { start: "<?", end: "?>", kind: DirectiveKind::Processing },
    Recognizer::Element { start: "<", end: ">" },
    Recognizer::Text,
];

/// Characters that end an unquoted attribute value
const UNQUOTED_VALUE_STOP: &[char] = &['"', '\'', '=', '<', '>', '`'];

const SCRIPT_CLOSE_TAG: &[u8] = b"</script";

impl Recognizer {
    /// Try to consume one construct at the cursor. Returns false (consuming
    /// nothing) when the construct does not start here.
    pub fn consume(&self, reader: &mut CodeReader<'_>, nodes: &mut Vec<Node>, chain: &[Recognizer]) -> bool {
        match *self {
            Recognizer::Text => {
                if reader.at_eof() {
                    return false;
                }
                consume_text(reader, nodes);
                true
            }
            Recognizer::Comment { start, end, html } => {
                let Some((code, span)) = consume_delimited(reader, start, end, false) else {
                    return false;
                };
                emit(nodes, code, span, NodeData::Comment { html });
                true
            }
            Recognizer::Doctype { start, end } => {
                let Some((code, span)) = consume_delimited(reader, start, end, true) else {
                    return false;
                };
                let data = parse_doctype(code, span.start.line);
                emit(nodes, code, span, NodeData::Directive(data));
                true
            }
            Recognizer::Directive { start, end, kind } => {
                let Some((code, span)) = consume_delimited(reader, start, end, true) else {
                    return false;
                };
                let inner = code.strip_prefix(start).unwrap_or(code);
                let inner = inner.strip_suffix(end).unwrap_or(inner);
                let (name, attributes) = parse_tag(inner, span.start.line, chain);
                let data = DirectiveData {
                    kind,
                    name: (!name.is_empty()).then_some(name),
                    attributes,
                };
                emit(nodes, code, span, NodeData::Directive(data));
                true
            }
            Recognizer::Expression { start, end } => {
                let Some((code, span)) = consume_delimited(reader, start, end, true) else {
                    return false;
                };
                emit(nodes, code, span, NodeData::Expression);
                true
            }
            Recognizer::Element { start, end } => {
                let Some((code, span)) = consume_delimited(reader, start, end, true) else {
                    return false;
                };
                let (name, attributes) = parse_tag(code, span.start.line, chain);
                let mut tag = TagData::new(name);
                tag.attributes = attributes;
                emit(nodes, code, span, NodeData::Tag(tag));
                true
            }
        }
    }
}

/// Tokenize a whole buffer with the given recognizer chain
pub fn tokenize_with(source: &str, chain: &[Recognizer]) -> Vec<Node> {
    let mut reader = CodeReader::new(source);
    let mut nodes = Vec::new();

    while !reader.at_eof() {
        // Script bodies are opaque: only the closing tag ends them
        if in_script(&nodes) && !at_script_close(&reader) {
            consume_text(&mut reader, &mut nodes);
            continue;
        }

        let before = reader.position().byte;
        let consumed = chain.iter().any(|r| r.consume(&mut reader, &mut nodes, chain));
        if !consumed || reader.position().byte == before {
            consume_text(&mut reader, &mut nodes);
        }
    }

    nodes
}

/// Tokenize with the server-page dialect
pub fn tokenize(source: &str) -> Vec<Node> {
    tokenize_with(source, PAGE_RECOGNIZERS)
}

/// Parse the single construct at the cursor of a tag's inner reader
fn nested_parse(reader: &mut CodeReader<'_>, chain: &[Recognizer]) -> Vec<Node> {
    let mut nodes = Vec::new();
    for recognizer in chain {
        if recognizer.consume(reader, &mut nodes, chain) {
            break;
        }
    }
    nodes
}

fn emit(nodes: &mut Vec<Node>, code: &str, span: Span, data: NodeData) {
    let node = Node { code: code.to_string(), span, data };
    trace!(target: "markup.tokenizer", kind = ?node.kind(), line = span.start.line, "emit node");
    nodes.push(node);
}

/// Consume `start ... end`. With `nested`, occurrences of `start` inside the
/// construct must be balanced by `end` first, and double-quoted runs are
/// skipped. The closing delimiter is part of the consumed text.
fn consume_delimited<'a>(
    reader: &mut CodeReader<'a>,
    start: &str,
    end: &str,
    nested: bool,
) -> Option<(&'a str, Span)> {
    if !reader.starts_with_ignore_case(start) {
        return None;
    }
    let begin = reader.position();

    if nested {
        let mut quoting = false;
        let mut nesting = 0i32;
        reader.pop_to(|r| {
            if r.peek_char() == Some('"') {
                quoting = !quoting;
            }
            if quoting {
                return false;
            }
            if r.starts_with_ignore_case(start) {
                nesting += 1;
                false
            } else if r.starts_with(end) {
                nesting -= 1;
                nesting < 0
            } else {
                false
            }
        });
    } else {
        reader.pop_to(|r| r.starts_with(end));
    }

    if reader.starts_with(end) {
        reader.advance_by(end.chars().count());
    }

    Some((reader.text_since(begin), Span { start: begin, end: reader.position() }))
}

// === Text ===

fn consume_text(reader: &mut CodeReader<'_>, nodes: &mut Vec<Node>) {
    let begin = reader.position();

    let script_end = if in_script(nodes) {
        Some(find_script_close(reader.rest().as_bytes()).unwrap_or(reader.rest().len()))
    } else {
        None
    };

    match script_end {
        Some(offset) if offset > 0 => reader.advance_to_byte(begin.byte + offset),
        _ => {
            reader.pop_to(|r| r.peek_char() == Some('<'));
        }
    }

    let code = reader.text_since(begin);
    emit(nodes, code, Span { start: begin, end: reader.position() }, NodeData::Text);
}

/// True when the last node opened a script element
fn in_script(nodes: &[Node]) -> bool {
    match nodes.last() {
        Some(node) => match node.as_tag() {
            Some(tag) => !node.is_end_tag() && tag.name.eq_ignore_ascii_case("script"),
            None => false,
        },
        None => false,
    }
}

fn at_script_close(reader: &CodeReader<'_>) -> bool {
    find_script_close(reader.rest().as_bytes()) == Some(0)
}

/// Offset of the first `</script>` (case-insensitive, ASCII whitespace
/// allowed before `>`)
fn find_script_close(haystack: &[u8]) -> Option<usize> {
    let n = SCRIPT_CLOSE_TAG.len();
    let mut i = 0;
    while i + n <= haystack.len() {
        i += memchr(b'<', &haystack[i..])?;
        if i + n > haystack.len() {
            return None;
        }
        if haystack[i..i + n].eq_ignore_ascii_case(SCRIPT_CLOSE_TAG) {
            let mut k = i + n;
            while k < haystack.len() && haystack[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < haystack.len() && haystack[k] == b'>' {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

// === Tags ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    BeforeNodeName,
    BeforeAttributeName,
    BeforeAttributeValue,
}

/// Split a tag's raw text into its name and attributes. `start_line` is the
/// line the raw text starts on, used to place attributes.
fn parse_tag(code: &str, start_line: usize, chain: &[Recognizer]) -> (String, Vec<Attribute>) {
    let mut reader = CodeReader::new(code);
    let mut name = String::new();
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut mode = ParseMode::BeforeNodeName;

    while let Some(ch) = reader.peek_char() {
        if ch.is_whitespace() {
            reader.advance();
            continue;
        }

        match ch {
            '=' => {
                mode = ParseMode::BeforeAttributeValue;
                reader.advance();
                continue;
            }
            '<' => {
                if mode == ParseMode::BeforeAttributeName {
                    // Tag-valued attribute: fold the nested tag in as an attribute
                    let line = reader.position().line + start_line - 1;
                    let before = reader.position().byte;
                    for node in nested_parse(&mut reader, chain) {
                        attributes.push(Attribute::new(node.code, line));
                    }
                    // No recognizer took the `<`; step over it
                    if reader.position().byte == before {
                        reader.advance();
                    }
                } else {
                    reader.advance();
                }
                continue;
            }
            '>' | '/' | '%' | '@' => {
                reader.advance();
                continue;
            }
            _ => {}
        }

        mode = match mode {
            ParseMode::BeforeNodeName => {
                name = reader
                    .pop_to(|r| matches!(r.peek_char(), Some(c) if c == '/' || c == '>' || c.is_whitespace()))
                    .to_string();
                ParseMode::BeforeAttributeName
            }
            ParseMode::BeforeAttributeName => {
                let qname = reader.pop_to(|r| match r.peek_char() {
                    Some('=') | Some('>') => true,
                    Some('/') => r.peek_next_char() == Some('>'),
                    Some(c) => c.is_whitespace(),
                    None => true,
                });
                let line = reader.position().line + start_line - 1;
                attributes.push(Attribute::new(qname.trim(), line));
                ParseMode::BeforeAttributeName
            }
            ParseMode::BeforeAttributeValue => {
                let (value, quote) = attribute_value(&mut reader);
                if let Some(attribute) = attributes.last_mut() {
                    attribute.value = Some(value);
                    attribute.quote = quote;
                }
                ParseMode::BeforeAttributeName
            }
        };
    }

    (name, attributes)
}

fn attribute_value(reader: &mut CodeReader<'_>) -> (String, Option<char>) {
    match reader.peek_char() {
        Some(quote @ ('"' | '\'')) => {
            reader.advance();
            let start = reader.position().byte;
            let len = quoted_value_len(reader.rest(), quote);
            reader.advance_to_byte(start + len);
            let raw = reader.text_since_byte(start);
            // closing quote
            if reader.peek_char() == Some(quote) {
                reader.advance();
            }
            (unescape_quotes(raw, quote), Some(quote))
        }
        _ => {
            let raw = reader.pop_to(|r| {
                matches!(r.peek_char(), Some(c) if c.is_whitespace() || UNQUOTED_VALUE_STOP.contains(&c))
            });
            (raw.trim().to_string(), None)
        }
    }
}

/// Length of a quoted value body. Quotes of the other kind open nested runs
/// (`"${a == 'b'}"`); when those never balance, the first unescaped closing
/// quote wins.
fn quoted_value_len(rest: &str, quote: char) -> usize {
    let mut stack = vec![quote];
    let mut previous = '\0';
    for (i, ch) in rest.char_indices() {
        if (ch == '\'' || ch == '"') && previous != '\\' {
            if stack.last() == Some(&ch) {
                stack.pop();
            } else {
                stack.push(ch);
            }
            if stack.is_empty() {
                return i;
            }
        }
        previous = ch;
    }

    let mut previous = '\0';
    for (i, ch) in rest.char_indices() {
        if ch == quote && previous != '\\' {
            return i;
        }
        previous = ch;
    }
    rest.len()
}

fn unescape_quotes(value: &str, quote: char) -> String {
    value.replace(&format!("\\{quote}"), &quote.to_string())
}

/// Doctype words: the first is the name, the rest become bare attributes
fn parse_doctype(code: &str, line: usize) -> DirectiveData {
    let mut reader = CodeReader::new(code);
    let mut words = Vec::new();

    while let Some(ch) = reader.peek_char() {
        if ch == '"' {
            reader.advance();
            words.push(reader.consume_while(|c| c != '"').to_string());
            reader.advance();
        } else if is_word_char(ch) {
            words.push(reader.consume_while(is_word_char).to_string());
        } else {
            reader.advance();
        }
    }

    let mut words = words.into_iter();
    DirectiveData {
        kind: DirectiveKind::Doctype,
        name: words.next(),
        attributes: words.map(|w| Attribute::new(w, line)).collect(),
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_' | ':')
}

use serde::Serialize;

/// Position in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Byte offset in source
    pub byte: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters)
    pub col: usize,
}

impl Position {
    pub fn new() -> Self {
        Self { byte: 0, line: 1, col: 0 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

/// Span in source text (a range from start position to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Character cursor over a source buffer with line/column tracking.
///
/// Every recognizer in the tokenizer chain works through this cursor; nested
/// tag parsing opens a fresh reader over a tag's raw text.
#[derive(Debug, Clone)]
pub struct CodeReader<'a> {
    source: &'a str,
    bytes: &'a [u8],
    position: Position,
}

impl<'a> CodeReader<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            position: Position::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Unconsumed remainder of the buffer
    pub fn rest(&self) -> &'a str {
        &self.source[self.position.byte..]
    }

    /// Source text between `start` and the current position
    pub fn text_since(&self, start: Position) -> &'a str {
        &self.source[start.byte..self.position.byte]
    }

    pub fn text_since_byte(&self, start: usize) -> &'a str {
        &self.source[start..self.position.byte]
    }

    pub fn at_eof(&self) -> bool {
        self.position.byte >= self.bytes.len()
    }

    pub fn peek_char(&self) -> Option<char> {
        if self.at_eof() {
            return None;
        }
        // Simple ASCII fast path
        let b = self.bytes[self.position.byte];
        if b < 128 {
            Some(b as char)
        } else {
            self.rest().chars().next()
        }
    }

    pub fn peek_next_char(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next()?;
        chars.next()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    pub fn starts_with_ignore_case(&self, prefix: &str) -> bool {
        let rest = self.rest().as_bytes();
        let prefix = prefix.as_bytes();
        rest.len() >= prefix.len() && rest[..prefix.len()].eq_ignore_ascii_case(prefix)
    }

    /// Consume one character, returning it
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position.byte += ch.len_utf8();

        if ch == '\n' {
            self.position.line += 1;
            self.position.col = 0;
        } else {
            self.position.col += 1;
        }
        Some(ch)
    }

    /// Consume up to `count` characters
    pub fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            if self.advance().is_none() {
                break;
            }
        }
    }

    /// Consume characters until the byte offset `target` is reached
    pub fn advance_to_byte(&mut self, target: usize) {
        let target = target.min(self.bytes.len());
        while self.position.byte < target {
            if self.advance().is_none() {
                break;
            }
        }
    }

    /// Consume at least one character, then keep consuming until `end`
    /// matches at the cursor or the input is exhausted.
    ///
    /// `end` sees the reader positioned on the next unconsumed character, so
    /// it can look ahead with `starts_with` and friends. Returns the consumed
    /// text.
    pub fn pop_to<F>(&mut self, mut end: F) -> &'a str
    where
        F: FnMut(&CodeReader<'a>) -> bool,
    {
        let start = self.position.byte;
        loop {
            if self.advance().is_none() || self.at_eof() || end(&*self) {
                break;
            }
        }
        &self.source[start..self.position.byte]
    }

    pub fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.position.byte;
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.advance();
        }
        &self.source[start..self.position.byte]
    }
}

//! Per-line classification of a parsed page.
//!
//! A node "owns" the line breaks inside its raw text. Whitespace-only text
//! carries the newline that terminates the previous construct's line, so the
//! first of its line breaks is credited to the previous node's class and the
//! rest count as blank. A final line without a terminating newline is
//! credited to the last node.

use super::node::{Document, Node, NodeKind};
use super::visitor::{scan, NodeVisitor};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Code,
    Comment,
    /// Comment that opens the document, before any other content
    HeaderComment,
    Blank,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Code => "code",
            LineKind::Comment => "comment",
            LineKind::HeaderComment => "header",
            LineKind::Blank => "blank",
        }
    }
}

/// Line statistics of one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineMetrics {
    /// Physical lines in the document
    pub total_lines: usize,
    pub lines_of_code: usize,
    pub comment_lines: usize,
    pub header_comment_lines: usize,
    pub blank_lines: usize,
    pub code_line_numbers: BTreeSet<usize>,
    pub comment_line_numbers: BTreeSet<usize>,
    pub header_comment_line_numbers: BTreeSet<usize>,
}

impl LineMetrics {
    /// Classification of a physical line. A line shared by several
    /// constructs takes the strongest class: code, then header comment,
    /// then comment.
    pub fn classify(&self, line: usize) -> LineKind {
        if self.code_line_numbers.contains(&line) {
            LineKind::Code
        } else if self.header_comment_line_numbers.contains(&line) {
            LineKind::HeaderComment
        } else if self.comment_line_numbers.contains(&line) {
            LineKind::Comment
        } else {
            LineKind::Blank
        }
    }

    /// Every physical line with its classification
    pub fn classified(&self) -> Vec<(usize, LineKind)> {
        (1..=self.total_lines).map(|line| (line, self.classify(line))).collect()
    }

    /// One `<line> <kind>` row per physical line, then the totals
    pub fn to_listing(&self) -> String {
        let mut out = String::new();
        for (line, kind) in self.classified() {
            let _ = writeln!(out, "{} {}", line, kind.as_str());
        }
        let _ = writeln!(
            out,
            "code {} comment {} header {} blank {}",
            self.lines_of_code, self.comment_lines, self.header_comment_lines, self.blank_lines
        );
        out
    }

    fn add(&mut self, kind: LineKind, count: usize) {
        match kind {
            LineKind::Code => self.lines_of_code += count,
            LineKind::Comment => self.comment_lines += count,
            LineKind::HeaderComment => self.header_comment_lines += count,
            LineKind::Blank => self.blank_lines += count,
        }
    }
}

/// Visitor computing [`LineMetrics`] with one node of lookback
#[derive(Debug, Default)]
pub struct LineCounter {
    metrics: LineMetrics,
    node_count: usize,
    index: usize,
    previous: Option<LineKind>,
}

impl LineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &LineMetrics {
        &self.metrics
    }

    pub fn into_metrics(self) -> LineMetrics {
        self.metrics
    }

    fn visit(&mut self, node: &Node) {
        let is_first = self.index == 0;
        let is_last = self.index + 1 == self.node_count;
        self.index += 1;

        let breaks = node.line_breaks();
        let trailing = usize::from(is_last && !node.code.ends_with('\n'));
        let lines = node.start_line()..=node.end_line();

        let class = match node.kind() {
            NodeKind::Tag | NodeKind::Directive | NodeKind::Expression => {
                self.metrics.add(LineKind::Code, breaks + trailing);
                self.metrics.code_line_numbers.extend(lines);
                LineKind::Code
            }
            NodeKind::Comment => {
                let kind = if is_first { LineKind::HeaderComment } else { LineKind::Comment };
                self.metrics.add(kind, breaks + trailing);
                let set = match kind {
                    LineKind::HeaderComment => &mut self.metrics.header_comment_line_numbers,
                    _ => &mut self.metrics.comment_line_numbers,
                };
                set.extend(lines);
                kind
            }
            NodeKind::Text if node.is_blank() => {
                let span = breaks + trailing;
                match self.previous {
                    Some(previous) if span > 0 && previous != LineKind::Blank => {
                        self.metrics.add(previous, 1);
                        self.metrics.add(LineKind::Blank, span - 1);
                    }
                    _ => self.metrics.add(LineKind::Blank, breaks + trailing),
                }
                LineKind::Blank
            }
            NodeKind::Text => {
                self.metrics.add(LineKind::Code, breaks + trailing);
                for (offset, segment) in node.code.split('\n').enumerate() {
                    if !segment.trim().is_empty() {
                        self.metrics.code_line_numbers.insert(node.start_line() + offset);
                    }
                }
                LineKind::Code
            }
        };

        self.previous = Some(class);
    }
}

impl NodeVisitor for LineCounter {
    fn start_document(&mut self, document: &Document) {
        self.metrics = LineMetrics::default();
        self.node_count = document.len();
        self.index = 0;
        self.previous = None;
        self.metrics.total_lines = match document.nodes.last() {
            Some(last) if last.code.ends_with('\n') => last.end_line() - 1,
            Some(last) => last.end_line(),
            None => 0,
        };
    }

    fn start_element(&mut self, node: &Node) {
        // Self-closing tags also get an end_element event; count them once
        self.visit(node);
    }

    fn end_element(&mut self, node: &Node) {
        if node.is_end_tag() {
            self.visit(node);
        }
    }

    fn characters(&mut self, node: &Node) {
        self.visit(node);
    }

    fn comment(&mut self, node: &Node) {
        self.visit(node);
    }

    fn expression(&mut self, node: &Node) {
        self.visit(node);
    }

    fn directive(&mut self, node: &Node) {
        self.visit(node);
    }
}

/// Classify every line of a document
pub fn count_lines(document: &Document) -> LineMetrics {
    let mut counter = LineCounter::new();
    scan(document, &mut [&mut counter]);
    counter.into_metrics()
}

use super::node::{Document, Node, NodeData};
use std::collections::BTreeSet;

/// Event hooks over a node list. Every hook defaults to a no-op so a visitor
/// only implements what it needs.
pub trait NodeVisitor {
    fn start_document(&mut self, _document: &Document) {}

    /// Start tag, including self-closing ones
    fn start_element(&mut self, _node: &Node) {}

    /// End tag, or the implicit end of a self-closing tag
    fn end_element(&mut self, _node: &Node) {}

    fn characters(&mut self, _node: &Node) {}

    fn comment(&mut self, _node: &Node) {}

    fn expression(&mut self, _node: &Node) {}

    fn directive(&mut self, _node: &Node) {}

    fn end_document(&mut self) {}
}

/// Drive every visitor over the document in node order
pub fn scan(document: &Document, visitors: &mut [&mut dyn NodeVisitor]) {
    for visitor in visitors.iter_mut() {
        visitor.start_document(document);
    }

    for node in &document.nodes {
        for visitor in visitors.iter_mut() {
            match &node.data {
                NodeData::Tag(_) => {
                    if node.is_end_tag() {
                        visitor.end_element(node);
                    } else {
                        visitor.start_element(node);
                        if node.is_self_closing() {
                            visitor.end_element(node);
                        }
                    }
                }
                NodeData::Text => visitor.characters(node),
                NodeData::Comment { .. } => visitor.comment(node),
                NodeData::Directive(_) => visitor.directive(node),
                NodeData::Expression => visitor.expression(node),
            }
        }
    }

    for visitor in visitors.iter_mut() {
        visitor.end_document();
    }
}

pub const SUPPRESSION_MARKER: &str = "//NOSONAR";

/// Collects the start lines of comments and expressions carrying the
/// suppression marker
#[derive(Debug, Default)]
pub struct SuppressionScanner {
    lines: BTreeSet<usize>,
}

impl SuppressionScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &BTreeSet<usize> {
        &self.lines
    }

    pub fn is_suppressed(&self, line: usize) -> bool {
        self.lines.contains(&line)
    }

    fn check(&mut self, node: &Node) {
        if node.code.contains(SUPPRESSION_MARKER) {
            self.lines.insert(node.start_line());
        }
    }
}

impl NodeVisitor for SuppressionScanner {
    fn start_document(&mut self, _document: &Document) {
        self.lines.clear();
    }

    fn comment(&mut self, node: &Node) {
        self.check(node);
    }

    fn expression(&mut self, node: &Node) {
        self.check(node);
    }
}

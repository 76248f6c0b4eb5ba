use super::node::{Document, Node, NodeData, NodeId};
use tracing::trace;

/// Links the flat node list into a tag tree.
///
/// One pass with a single "current open parent": a start tag becomes a child
/// of the current parent and then the current parent itself; an end tag pops
/// back to the enclosing parent. Self-closing tags are attached but never
/// opened. Nothing is matched by name, so unbalanced markup only produces a
/// differently shaped tree.
pub struct TreeBuilder {
    nodes: Vec<Node>,
    current: Option<NodeId>,
}

impl TreeBuilder {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes, current: None }
    }

    pub fn build(mut self) -> Document {
        for index in 0..self.nodes.len() {
            let id = NodeId(index);
            let node = &self.nodes[index];
            if !matches!(node.data, NodeData::Tag(_)) {
                continue;
            }

            if node.is_end_tag() {
                self.pop();
            } else if node.is_self_closing() {
                self.attach(id);
            } else {
                self.attach(id);
                self.current = Some(id);
            }
        }

        if let Some(open) = self.current {
            trace!(target: "markup.tree", node = open.0, "document ended with open elements");
        }

        Document::new(self.nodes)
    }

    fn attach(&mut self, id: NodeId) {
        let parent = self.current;
        if let NodeData::Tag(tag) = &mut self.nodes[id.0].data {
            tag.parent = parent;
        }
        if let Some(parent) = parent {
            if let NodeData::Tag(tag) = &mut self.nodes[parent.0].data {
                tag.children.push(id);
            }
        }
    }

    /// Move the current parent up one level; a no-op at the root
    fn pop(&mut self) {
        if let Some(current) = self.current {
            self.current = match &self.nodes[current.0].data {
                NodeData::Tag(tag) => tag.parent,
                _ => None,
            };
        }
    }
}

/// Build the tag tree for a node list
pub fn build_hierarchy(nodes: Vec<Node>) -> Document {
    TreeBuilder::new(nodes).build()
}

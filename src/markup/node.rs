use serde::Serialize;

pub use super::reader::{Position, Span};

/// Index of a node inside its [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Kind of lexed construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Tag,
    Text,
    Comment,
    Directive,
    Expression,
}

/// Attribute of a tag or directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    /// `None` for bare attributes (`disabled`, nested tags)
    pub value: Option<String>,
    /// Quote character around the value, `None` when unquoted
    pub quote: Option<char>,
    /// Line the attribute was declared on (1-indexed)
    pub line: usize,
}

impl Attribute {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            value: None,
            quote: None,
            line,
        }
    }

    pub fn is_double_quoted(&self) -> bool {
        self.quote == Some('"')
    }

    pub fn is_single_quoted(&self) -> bool {
        self.quote == Some('\'')
    }
}

/// Element data: name, attributes and tree links
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagData {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Enclosing start element (back-pointer, not owning)
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TagData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Name without namespace prefix (`c:out` -> `out`)
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) if !local.is_empty() => local,
            _ => &self.name,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.local_name().eq_ignore_ascii_case(name)
    }

    /// Value of the first attribute with this name (case-insensitive)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }
}

/// Flavour of directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    /// `<!DOCTYPE ...>`
    Doctype,
    /// `<? ... ?>`
    Processing,
    /// `<%@ ... %>`
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveData {
    pub kind: DirectiveKind,
    pub name: Option<String>,
    pub attributes: Vec<Attribute>,
}

/// Kind-specific payload of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    Tag(TagData),
    Text,
    /// `html` is false for server-side comments (`<%-- --%>`)
    Comment { html: bool },
    Directive(DirectiveData),
    Expression,
}

/// One lexed construct with its raw text and position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub code: String,
    pub span: Span,
    pub data: NodeData,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Tag(_) => NodeKind::Tag,
            NodeData::Text => NodeKind::Text,
            NodeData::Comment { .. } => NodeKind::Comment,
            NodeData::Directive(_) => NodeKind::Directive,
            NodeData::Expression => NodeKind::Expression,
        }
    }

    pub fn start_line(&self) -> usize {
        self.span.start.line
    }

    pub fn end_line(&self) -> usize {
        self.span.end.line
    }

    /// Number of line breaks inside the raw text
    pub fn line_breaks(&self) -> usize {
        self.code.matches('\n').count()
    }

    pub fn as_tag(&self) -> Option<&TagData> {
        match &self.data {
            NodeData::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    /// `</name>`
    pub fn is_end_tag(&self) -> bool {
        matches!(self.data, NodeData::Tag(_)) && self.code.starts_with("</")
    }

    /// `<name/>`
    pub fn is_self_closing(&self) -> bool {
        matches!(self.data, NodeData::Tag(_)) && self.code.ends_with("/>")
    }

    /// Text node made of whitespace only
    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

/// Node list of one parsed file; doubles as the arena the tag tree lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn tag(&self, id: NodeId) -> Option<&TagData> {
        self.get(id).and_then(Node::as_tag)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tag(id).and_then(|t| t.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.tag(id).map(|t| t.children.as_slice()).unwrap_or(&[])
    }

    /// Start elements that have no enclosing element
    pub fn roots(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| matches!(&n.data, NodeData::Tag(t) if t.parent.is_none()) && !n.is_end_tag())
            .map(|(id, _)| id)
            .collect()
    }

    /// Raw text of every node concatenated, which reproduces the input
    pub fn source_text(&self) -> String {
        self.nodes.iter().map(|n| n.code.as_str()).collect()
    }
}

//! Server-page markup: tokenizer chain, tag tree, line metrics and
//! highlighting.

pub mod highlight;
pub mod lines;
pub mod node;
pub mod reader;
pub mod tokenizer;
pub mod tree_builder;
pub mod visitor;

pub use lines::{count_lines, LineCounter, LineKind, LineMetrics};
pub use node::{Attribute, DirectiveData, DirectiveKind, Document, Node, NodeData, NodeId, NodeKind, TagData};
pub use tokenizer::Recognizer;
pub use tree_builder::{build_hierarchy, TreeBuilder};
pub use visitor::{scan, NodeVisitor, SuppressionScanner};

use crate::error::ParseError;
use encoding_rs::Encoding;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lexer for one markup dialect
#[derive(Debug, Clone, Copy)]
pub struct PageLexer {
    recognizers: &'static [Recognizer],
}

impl PageLexer {
    /// Server pages: markup plus directives, scriptlets and server comments
    pub fn page() -> Self {
        Self { recognizers: tokenizer::PAGE_RECOGNIZERS }
    }

    /// Plain markup
    pub fn html() -> Self {
        Self { recognizers: tokenizer::HTML_RECOGNIZERS }
    }

    pub fn recognizers(&self) -> &'static [Recognizer] {
        self.recognizers
    }

    /// Flat node list covering `source`
    pub fn lex(&self, source: &str) -> Vec<Node> {
        tokenizer::tokenize_with(source, self.recognizers)
    }

    /// Node list with the tag tree linked
    pub fn parse(&self, source: &str) -> Document {
        build_hierarchy(self.lex(source))
    }
}

impl Default for PageLexer {
    fn default() -> Self {
        Self::page()
    }
}

/// Parse already-decoded page source
pub fn parse_str(source: &str) -> Document {
    PageLexer::page().parse(source)
}

/// Decode `bytes` with the charset named by `charset` and parse the result.
///
/// A byte-order mark overrides the label and is stripped. Malformed byte
/// sequences are replaced rather than rejected; only an unknown label fails.
pub fn parse(bytes: &[u8], charset: &str) -> Result<Document, ParseError> {
    let encoding = Encoding::for_label(charset.trim().as_bytes())
        .ok_or_else(|| ParseError::UnknownCharset(charset.to_string()))?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(charset = used.name(), "replaced malformed byte sequences while decoding");
    }
    Ok(parse_str(&text))
}

pub fn parse_reader<R: Read>(mut reader: R, charset: &str) -> Result<Document, ParseError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse(&bytes, charset)
}

pub fn parse_file(path: &Path, charset: &str) -> Result<Document, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes, charset)
}

/// Parse each file on its own. A failing file is logged and reported in its
/// slot; the rest of the batch still runs.
pub fn parse_files<P: AsRef<Path>>(paths: &[P], charset: &str) -> Vec<(PathBuf, Result<Document, ParseError>)> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let result = parse_file(path, charset);
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "failed to parse page");
            }
            (path.to_path_buf(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latin1() {
        let bytes = b"<p>caf\xe9</p>";
        let doc = parse(bytes, "ISO-8859-1").unwrap();
        assert_eq!(doc.nodes[1].code, "café");
    }

    #[test]
    fn test_bom_is_stripped() {
        let bytes = b"\xef\xbb\xbf<p>x</p>";
        let doc = parse(bytes, "utf-8").unwrap();
        assert_eq!(doc.source_text(), "<p>x</p>");
        assert_eq!(doc.nodes[0].span.start.col, 0);
    }

    #[test]
    fn test_utf16_bom_overrides_label() {
        let bytes = [0xff, 0xfe, b'<', 0, b'b', 0, b'>', 0];
        let doc = parse(&bytes, "utf-8").unwrap();
        assert_eq!(doc.source_text(), "<b>");
    }

    #[test]
    fn test_unknown_charset() {
        let err = parse(b"x", "no-such-charset").unwrap_err();
        assert!(matches!(err, ParseError::UnknownCharset(label) if label == "no-such-charset"));
    }

    #[test]
    fn test_parse_reader() {
        let doc = parse_reader(&b"<a>b</a>"[..], "UTF-8").unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.roots().len(), 1);
    }

    #[test]
    fn test_parse_files_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jsp");
        fs::write(&good, "<p>ok</p>").unwrap();
        let missing = dir.path().join("missing.jsp");

        let results = parse_files(&[&missing, &good], "UTF-8");
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].1, Err(ParseError::Io(_))));
        assert_eq!(results[1].1.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_html_lexer_ignores_scriptlets() {
        let nodes = PageLexer::html().lex("<%-- x --%>");
        assert!(nodes.iter().all(|n| n.kind() != NodeKind::Comment));
    }
}

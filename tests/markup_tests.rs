//! Page parsing through the public API

use pretty_assertions::assert_eq;
use source_locator::markup::{
    count_lines, parse_files, parse_str, scan, LineCounter, LineKind, NodeKind, PageLexer, SuppressionScanner,
};
use std::fs;

const PAGE: &str = r#"<%@ page import="java.util.List" %>
<!DOCTYPE html>
<html>
<head>
  <script type="text/javascript">
    if (items.length < 3 && ok) { render("<b>"); }
  </script>
</head>
<body>
  <%-- list the items //NOSONAR --%>
  <ul>
    <c:forEach var="item" items="${items}">
      <li class='entry'><%= item.getName() %></li>
    </c:forEach>
  </ul>
  <br/>
</body>
</html>
"#;

#[test]
fn test_nodes_cover_the_input() {
    let inputs = [
        PAGE,
        "",
        "plain text",
        "<",
        "<%",
        "<!-- never closed",
        "<a href=\"x",
        "<p title='it''s'>é ü 日本</p>",
        "<script>unterminated < script",
        "<%@ page %><? xml ?><!doctype html>",
        "a\r\nb\rc\n",
    ];

    for input in inputs {
        let document = parse_str(input);
        assert_eq!(document.source_text(), input, "input {:?}", input);

        let mut offset = 0;
        for node in &document.nodes {
            assert!(!node.code.is_empty(), "empty node in {:?}", input);
            assert_eq!(node.span.start.byte, offset, "gap before {:?} in {:?}", node.code, input);
            offset = node.span.end.byte;
        }
        assert_eq!(offset, input.len());
    }
}

#[test]
fn test_page_structure() {
    let document = parse_str(PAGE);

    let roots: Vec<&str> = document
        .roots()
        .into_iter()
        .filter_map(|id| document.tag(id))
        .map(|tag| tag.name.as_str())
        .collect();
    assert_eq!(roots, vec!["html"]);

    let (for_each, tag) = document
        .iter()
        .find_map(|(id, node)| node.as_tag().filter(|t| t.is_named("forEach")).map(|t| (id, t)))
        .unwrap();
    assert_eq!(tag.attribute("items"), Some("${items}"));
    assert_eq!(document.tag(document.parent(for_each).unwrap()).unwrap().name, "ul");

    let li = document.children(for_each)[0];
    let li_tag = document.tag(li).unwrap();
    assert_eq!(li_tag.name, "li");
    assert!(li_tag.attributes[0].is_single_quoted());
    assert_eq!(document.get(li).unwrap().start_line(), 13);
}

#[test]
fn test_script_body_is_text() {
    let document = parse_str(PAGE);
    let script = document
        .iter()
        .position(|(_, node)| node.as_tag().is_some_and(|t| t.name == "script") && !node.is_end_tag())
        .unwrap();

    let body = &document.nodes[script + 1];
    assert_eq!(body.kind(), NodeKind::Text);
    assert!(body.code.contains("render(\"<b>\")"));
    assert!(document.nodes[script + 2].is_end_tag());
}

#[test]
fn test_node_kinds() {
    let kinds: Vec<NodeKind> = parse_str("<%@ page %><%-- c --%><%= x %><p>t</p>")
        .nodes
        .iter()
        .map(|n| n.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Directive,
            NodeKind::Comment,
            NodeKind::Expression,
            NodeKind::Tag,
            NodeKind::Text,
            NodeKind::Tag,
        ]
    );

    let html = PageLexer::html().lex("<%= x %>");
    assert!(html.iter().all(|n| n.kind() != NodeKind::Expression));
}

#[test]
fn test_visitors_share_one_pass() {
    let document = parse_str(PAGE);
    let mut counter = LineCounter::new();
    let mut suppressions = SuppressionScanner::new();
    scan(&document, &mut [&mut counter, &mut suppressions]);

    assert_eq!(suppressions.lines().iter().copied().collect::<Vec<_>>(), vec![10]);
    assert_eq!(counter.metrics(), &count_lines(&document));
}

#[test]
fn test_page_line_classes() {
    let metrics = count_lines(&parse_str(PAGE));
    assert_eq!(metrics.total_lines, 18);
    assert_eq!(metrics.classify(10), LineKind::Comment);
    assert_eq!(metrics.comment_lines, 1);
    assert_eq!(metrics.header_comment_lines, 0);
    assert_eq!(metrics.blank_lines, 0);
    assert_eq!(metrics.lines_of_code, 17);
    assert!(metrics.classified().iter().all(|(line, kind)| *line == 10 || *kind == LineKind::Code));
}

#[test]
fn test_parse_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.jsp");
    let latin = dir.path().join("latin.jsp");
    fs::write(&good, PAGE).unwrap();
    fs::write(&latin, b"<p>caf\xe9</p>").unwrap();
    let missing = dir.path().join("missing.jsp");

    let results = parse_files(&[&good, &latin, &missing], "ISO-8859-1");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].1.as_ref().unwrap().source_text(), PAGE);
    assert_eq!(results[1].1.as_ref().unwrap().source_text(), "<p>café</p>");
    assert!(results[2].1.is_err());
}

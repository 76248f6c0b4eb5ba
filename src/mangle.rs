//! Reversible mangling of arbitrary strings into generated-code identifiers,
//! and the naming conventions template compilers use for class names.
//!
//! An unsafe character becomes `_` followed by the four lowercase hex digits
//! of each of its UTF-16 code units (`-` -> `_002d`). The marker itself is
//! escaped too, so [`decode_identifier`] inverts [`encode_identifier`]
//! exactly.
//!
//! The package form produced by [`NamingConventions::encode_package_path`]
//! is lossy: `.` becomes a plain `_`, a `_` is prepended to segments that
//! cannot start an identifier, and reserved keywords get a trailing `_`.
//! Decoding strips the keyword suffix but cannot undo the other two.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ESCAPE_MARKER: char = '_';

lazy_static! {
    /// `._dir.__page` tail of precompiled-container class names
    static ref CONTAINER_PAGE: Regex = Regex::new(r"\.__([^.]+)$").unwrap();
}

/// Reserved words of the generated language
pub const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long", "native",
    "new", "package", "private", "protected", "public", "return", "short", "static", "strictfp",
    "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try", "void",
    "volatile", "while",
];

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '$'
}

fn push_escaped(out: &mut String, ch: char) {
    let mut units = [0u16; 2];
    for unit in ch.encode_utf16(&mut units) {
        out.push(ESCAPE_MARKER);
        out.push_str(&format!("{:04x}", unit));
    }
}

/// Escape every character that may not appear in an identifier, plus the
/// escape marker. A leading digit is escaped as well.
pub fn encode_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, ch) in raw.chars().enumerate() {
        let safe = is_identifier_part(ch) && !(i == 0 && ch.is_ascii_digit());
        if safe {
            out.push(ch);
        } else {
            push_escaped(&mut out, ch);
        }
    }
    out
}

/// Code unit of a `_hhhh` escape at the start of `s`
fn escape_unit(s: &str) -> Option<u16> {
    let hex = s.strip_prefix(ESCAPE_MARKER)?.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

/// Characters an encoder would have escaped. Escapes of anything else are
/// left alone so identifiers like `my_cafe` survive decoding.
fn is_escaped_form(ch: char) -> bool {
    !is_identifier_part(ch) || ch == ESCAPE_MARKER || ch.is_ascii_digit()
}

/// Replace every `_hhhh` escape with its character. Text without escapes
/// comes back unchanged.
pub fn decode_identifier(mangled: &str) -> String {
    let mut out = String::with_capacity(mangled.len());
    let mut rest = mangled;

    while let Some(pos) = rest.find(ESCAPE_MARKER) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let Some(unit) = escape_unit(tail) else {
            out.push(ESCAPE_MARKER);
            rest = &tail[1..];
            continue;
        };

        // Surrogate pairs take two consecutive escapes
        let (decoded, consumed) = match char::from_u32(u32::from(unit)) {
            Some(ch) => (Some(ch), 5),
            None => match escape_unit(&tail[5..]) {
                Some(low) => match char::decode_utf16([unit, low]).next() {
                    Some(Ok(ch)) => (Some(ch), 10),
                    _ => (None, 5),
                },
                None => (None, 5),
            },
        };

        match decoded {
            Some(ch) if is_escaped_form(ch) => out.push(ch),
            _ => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}

/// Generated-name suffix and the file extension it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixRule {
    /// Trailing text of the class name (`_jsp`)
    pub mangled: String,
    /// Replacement in the source path (`.jsp`)
    pub restored: String,
}

impl SuffixRule {
    pub fn new(mangled: impl Into<String>, restored: impl Into<String>) -> Self {
        Self { mangled: mangled.into(), restored: restored.into() }
    }
}

/// How template compilers name the classes they generate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConventions {
    /// Package directories compilers put in front of the page path, tried
    /// in order
    pub package_prefixes: Vec<String>,
    pub suffixes: Vec<SuffixRule>,
    /// Reserved words that get a trailing `_` in package segments
    pub keywords: Vec<String>,
    /// Root package of precompiled-container classes
    pub container_package: String,
}

impl Default for NamingConventions {
    fn default() -> Self {
        Self {
            package_prefixes: vec!["jsp/".to_string(), "org/apache/jsp/".to_string()],
            suffixes: vec![SuffixRule::new("_jsp", ".jsp")],
            keywords: JAVA_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            container_package: "jsp_servlet".to_string(),
        }
    }
}

impl NamingConventions {
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.iter().any(|k| k == word)
    }

    fn suffix_of(&self, class_name: &str) -> Option<&SuffixRule> {
        self.suffixes
            .iter()
            .find(|rule| !rule.mangled.is_empty() && class_name.ends_with(&rule.mangled))
    }

    /// Whether the class name looks like a compiled template
    pub fn is_template_class(&self, class_name: &str) -> bool {
        self.suffix_of(class_name).is_some() || self.is_container_class(class_name)
    }

    fn is_container_class(&self, class_name: &str) -> bool {
        !self.container_package.is_empty() && class_name.starts_with(&self.container_package)
    }

    /// Recover a source path from a dotted, mangled class name:
    /// `org.apache.jsp.dir.hello_005fworld_jsp` -> `org/apache/jsp/dir/hello_world.jsp`
    pub fn decode_path(&self, mangled: &str) -> String {
        let (body, restored) = match self.suffix_of(mangled) {
            Some(rule) => (&mangled[..mangled.len() - rule.mangled.len()], rule.restored.as_str()),
            None => (mangled, ""),
        };

        let segments: Vec<String> = body
            .split('.')
            .map(|segment| {
                let segment = match segment.strip_suffix('_') {
                    Some(word) if self.is_keyword(word) => word,
                    _ => segment,
                };
                decode_identifier(segment)
            })
            .collect();

        let mut path = segments.join("/");
        path.push_str(restored);
        path
    }

    /// Package form of a directory path (`/dir/my-app` -> `dir.my_002dapp`)
    pub fn encode_package_path(&self, path: &str) -> String {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.encode_package_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn encode_package_segment(&self, segment: &str) -> String {
        let mut out = String::with_capacity(segment.len() + 1);
        if let Some(first) = segment.chars().next() {
            if !(first.is_alphabetic() || first == '_' || first == '$') {
                out.push('_');
            }
        }
        for ch in segment.chars() {
            if is_identifier_part(ch) {
                out.push(ch);
            } else if ch == '.' {
                out.push('_');
            } else {
                push_escaped(&mut out, ch);
            }
        }
        if self.is_keyword(&out) {
            out.push('_');
        }
        out
    }

    /// Candidate page paths for a compiled-template class name, most
    /// specific first. Empty for ordinary classes.
    pub fn template_candidates(&self, class_name: &str) -> Vec<String> {
        let mut candidates = Vec::new();

        if self.is_container_class(class_name) {
            let extension = self.suffixes.first().map(|r| r.restored.as_str()).unwrap_or("");
            let rest = &class_name[self.container_package.len()..];
            let page = CONTAINER_PAGE.replace(rest, format!("/${{1}}{extension}").as_str());
            candidates.push(page.replace("._", "/"));
        }

        if self.suffix_of(class_name).is_some() {
            let decoded = self.decode_path(class_name);
            let stripped: Vec<String> = self
                .package_prefixes
                .iter()
                .filter_map(|prefix| decoded.strip_prefix(prefix.as_str()))
                .map(str::to_string)
                .collect();
            candidates.push(decoded);
            candidates.extend(stripped);
        }

        candidates
    }
}

/// Decode with the default conventions
pub fn decode_identifier_path(mangled: &str) -> String {
    NamingConventions::default().decode_path(mangled)
}

/// Source path of an ordinary class: `a.b.Outer$Inner` -> `a/b/Outer.java`
pub fn java_source_path(class_name: &str) -> String {
    let outer = class_name.split('$').next().unwrap_or(class_name);
    format!("{}.java", outer.replace('.', "/"))
}

/// Source path from the class's `SourceFile` attribute, placed in the
/// class's package: (`a.b.C`, `Outer.kt`) -> `a/b/Outer.java`
pub fn java_source_path_from_attribute(class_name: &str, source_file: &str) -> String {
    let stem = source_file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(source_file);
    match class_name.rsplit_once('.') {
        Some((package, _)) => java_source_path(&format!("{package}.{stem}")),
        None => java_source_path(stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_identifier() {
        assert_eq!(encode_identifier("hello_world"), "hello_005fworld");
        assert_eq!(encode_identifier("my-page.jsp"), "my_002dpage_002ejsp");
        assert_eq!(encode_identifier("9lives"), "_0039lives");
        assert_eq!(encode_identifier("café"), "café");
        assert_eq!(encode_identifier("a b"), "a_0020b");
    }

    #[test]
    fn test_encode_supplementary_char() {
        assert_eq!(encode_identifier("x😀"), "x_d83d_de00");
        assert_eq!(decode_identifier("x_d83d_de00"), "x😀");
    }

    #[test]
    fn test_decode_leaves_clean_identifiers() {
        assert_eq!(decode_identifier("plainName"), "plainName");
        assert_eq!(decode_identifier("my_var"), "my_var");
        assert_eq!(decode_identifier("my_cafe"), "my_cafe");
        assert_eq!(decode_identifier("trailing_"), "trailing_");
        assert_eq!(decode_identifier("_00"), "_00");
    }

    #[test]
    fn test_decode_keeps_lone_surrogate() {
        assert_eq!(decode_identifier("a_d83db"), "a_d83db");
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            "",
            "index",
            "hello_world",
            "dir/sub/page.jsp",
            "über straße",
            "1st-page",
            "_0041 literal escape",
            "emoji 😀 and 漢字",
            "tab\tnewline\n",
            "class",
        ];
        for sample in samples {
            let encoded = encode_identifier(sample);
            assert!(encoded.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'), "{encoded}");
            assert_eq!(decode_identifier(&encoded), sample);
            assert_eq!(decode_identifier_path(&encoded), sample);
        }
    }

    #[test]
    fn test_decode_path() {
        let conventions = NamingConventions::default();
        assert_eq!(
            conventions.decode_path("org.apache.jsp.test.hello_005fworld_jsp"),
            "org/apache/jsp/test/hello_world.jsp"
        );
        assert_eq!(conventions.decode_path("jsp.WEB_002dINF.page_jsp"), "jsp/WEB-INF/page.jsp");
        assert_eq!(conventions.decode_path("pkg.class_.Page"), "pkg/class/Page");
    }

    #[test]
    fn test_encode_package_path() {
        let conventions = NamingConventions::default();
        assert_eq!(conventions.encode_package_path("/dir/my-app"), "dir.my_002dapp");
        assert_eq!(conventions.encode_package_path("1up/v1.2"), "_1up.v1_2");
        assert_eq!(conventions.encode_package_path("web/class"), "web.class_");
        assert_eq!(conventions.decode_path("web.class_"), "web/class");
    }

    #[test]
    fn test_jasper_candidates() {
        let conventions = NamingConventions::default();
        assert_eq!(
            conventions.template_candidates("org.apache.jsp.folder.hello_jsp"),
            vec!["org/apache/jsp/folder/hello.jsp", "folder/hello.jsp"]
        );
        assert_eq!(
            conventions.template_candidates("jsp.hello_005fworld_jsp"),
            vec!["jsp/hello_world.jsp", "hello_world.jsp"]
        );
    }

    #[test]
    fn test_container_candidates() {
        let conventions = NamingConventions::default();
        assert_eq!(
            conventions.template_candidates("jsp_servlet._folder1._folder2.__hello"),
            vec!["/folder1/folder2/hello.jsp"]
        );
    }

    #[test]
    fn test_ordinary_class_has_no_template_candidates() {
        let conventions = NamingConventions::default();
        assert!(conventions.template_candidates("com.example.Service").is_empty());
        assert!(!conventions.is_template_class("com.example.Service"));
    }

    #[test]
    fn test_java_source_paths() {
        assert_eq!(java_source_path("a.b.Outer$Inner$1"), "a/b/Outer.java");
        assert_eq!(java_source_path("Top"), "Top.java");
        assert_eq!(java_source_path_from_attribute("a.b.FileKt", "File.kt"), "a/b/File.java");
        assert_eq!(java_source_path_from_attribute("Top", "Other.java"), "Other.java");
    }
}

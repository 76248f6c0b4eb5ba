//! Decoder for source debug extensions (SMAP).
//!
//! ```text
//! SMAP
//! Hello_jsp.java      generated file name
//! JSP                 default stratum
//! *S JSP              stratum section
//! *F                  file section
//! + 0 hello.jsp       "+" means the next line holds the path
//! /hello.jsp
//! *L                  line section
//! 1#0,3:20,2          InputStart[#FileId][,Repeat]:OutputStart[,Increment]
//! *E
//! ```
//!
//! Only the first stratum section is decoded.

pub mod strata;

pub use strata::{StrataTable, StratumRule};

use crate::error::DebugMapError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::trace;

lazy_static! {
    static ref LINE_RECORD: Regex =
        Regex::new(r"^([0-9]+)(?:#([0-9]+))?(?:,([0-9]+))?:([0-9]+)(?:,([0-9]+))?$").unwrap();
}

/// Source file declared in the `*F` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    /// Declared path, or the name when none was given
    pub path: String,
}

/// Where one generated line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineTarget {
    pub file_id: u32,
    pub line: u32,
}

/// A generated line mapped back to its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition<'a> {
    pub file_id: u32,
    pub file: &'a FileInfo,
    pub line: u32,
}

/// Decoded debug map. Every line target refers to a declared file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugMap {
    /// Generated file the map was embedded in
    pub generated_file: String,
    pub default_stratum: String,
    /// Name of the decoded stratum section
    pub stratum: String,
    pub files: BTreeMap<u32, FileInfo>,
    pub lines: BTreeMap<u32, LineTarget>,
}

impl DebugMap {
    pub fn decode(text: &str) -> Result<Self, DebugMapError> {
        Decoder::new(text).decode()
    }

    /// Source position of a generated line
    pub fn lookup(&self, output_line: u32) -> Option<SourcePosition<'_>> {
        let target = self.lines.get(&output_line)?;
        let file = self.files.get(&target.file_id)?;
        Some(SourcePosition { file_id: target.file_id, file, line: target.line })
    }

    pub fn is_primary(&self, position: &SourcePosition<'_>, strata: &StrataTable) -> bool {
        strata.is_primary(&self.stratum, position.file_id, &position.file.path)
    }

    /// Stable plain-text dump, one fact per line
    pub fn to_listing(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "generated: {}", self.generated_file);
        let _ = writeln!(out, "stratum: {} (default {})", self.stratum, self.default_stratum);
        for (id, file) in &self.files {
            let _ = writeln!(out, "file {}: {} -> {}", id, file.name, file.path);
        }
        for (output, target) in &self.lines {
            let _ = writeln!(out, "{} -> {}#{}", output, target.file_id, target.line);
        }
        out
    }
}

/// Decode a debug map blob
pub fn decode_debug_map(text: &str) -> Result<DebugMap, DebugMapError> {
    DebugMap::decode(text)
}

/// Split on `\r\n`, `\n` or `\r`; a final terminator does not start a line
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

struct Decoder<'a> {
    lines: Vec<&'a str>,
    next: usize,
}

impl<'a> Decoder<'a> {
    fn new(text: &'a str) -> Self {
        Self { lines: split_lines(text), next: 0 }
    }

    /// Next line with its 1-based number
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = *self.lines.get(self.next)?;
        self.next += 1;
        Some((self.next, line))
    }

    fn expect_line(&mut self, section: &'static str) -> Result<(usize, &'a str), DebugMapError> {
        self.next_line()
            .ok_or(DebugMapError::UnexpectedEof { section, line: self.next + 1 })
    }

    fn decode(mut self) -> Result<DebugMap, DebugMapError> {
        let (line, magic) = self.expect_line("header")?;
        if magic.trim() != "SMAP" {
            return Err(bad_header(line, "`SMAP`", magic));
        }
        let (_, generated_file) = self.expect_line("header")?;
        let (_, default_stratum) = self.expect_line("header")?;

        let (line, section) = self.expect_line("header")?;
        let stratum = match section.trim_end().strip_prefix("*S ") {
            Some(name) if !name.trim().is_empty() => name.trim(),
            _ => return Err(bad_header(line, "`*S <stratum>`", section)),
        };

        let (line, marker) = self.expect_line("header")?;
        if marker.trim() != "*F" {
            return Err(bad_header(line, "`*F`", marker));
        }

        let files = self.file_section()?;
        let lines = self.line_section(&files)?;

        trace!(
            target: "smap",
            stratum,
            files = files.len(),
            lines = lines.len(),
            "decoded debug map"
        );

        Ok(DebugMap {
            generated_file: generated_file.trim().to_string(),
            default_stratum: default_stratum.trim().to_string(),
            stratum: stratum.to_string(),
            files,
            lines,
        })
    }

    /// `*F` entries up to the `*L` marker
    fn file_section(&mut self) -> Result<BTreeMap<u32, FileInfo>, DebugMapError> {
        let mut files = BTreeMap::new();

        loop {
            let (line, text) = self.expect_line("file section")?;
            let trimmed = text.trim();
            if trimmed == "*L" {
                return Ok(files);
            }
            if trimmed.is_empty() {
                continue;
            }

            let (entry, path) = match trimmed.strip_prefix('+') {
                Some(entry) => {
                    let (_, path) = self.expect_line("file section")?;
                    (entry.trim_start(), Some(path.trim()))
                }
                None => (trimmed, None),
            };

            let bad_entry = || DebugMapError::BadFileEntry { line, text: text.to_string() };
            let (id, name) = entry.split_once(char::is_whitespace).ok_or_else(bad_entry)?;
            let id: u32 = id.parse().map_err(|_| bad_entry())?;
            let name = name.trim();
            if name.is_empty() {
                return Err(bad_entry());
            }

            files.entry(id).or_insert_with(|| FileInfo {
                name: name.to_string(),
                path: file_path(name, path),
            });
        }
    }

    /// `*L` records up to `*E`, the next `*S`, or end of input
    fn line_section(&mut self, files: &BTreeMap<u32, FileInfo>) -> Result<BTreeMap<u32, LineTarget>, DebugMapError> {
        let mut lines = BTreeMap::new();
        let mut last_file_id = 0u32;

        while let Some((line, text)) = self.next_line() {
            let trimmed = text.trim();
            if trimmed == "*E" || trimmed.starts_with("*S") {
                break;
            }
            if trimmed.is_empty() || trimmed.starts_with('*') {
                continue;
            }

            let record = LineRecord::parse(trimmed, last_file_id)
                .ok_or_else(|| DebugMapError::BadLineRecord { line, text: text.to_string() })?;
            if !files.contains_key(&record.file_id) {
                return Err(DebugMapError::UnknownFile { file_id: record.file_id, line });
            }
            record.expand_into(&mut lines);
            last_file_id = record.file_id;
        }

        Ok(lines)
    }
}

fn bad_header(line: usize, expected: &'static str, found: &str) -> DebugMapError {
    DebugMapError::BadHeader { line, expected, found: found.to_string() }
}

/// Resolved path of a `*F` entry. Kotlin declares the path of some other
/// file in the same package, so only its directory is kept.
pub fn file_path(name: &str, path: Option<&str>) -> String {
    match path {
        None => name.to_string(),
        Some(path) if name.ends_with(".kt") => {
            let dir = path.rfind('/').map(|i| &path[..=i]).unwrap_or("");
            format!("{dir}{name}")
        }
        Some(path) => path.to_string(),
    }
}

/// One `*L` record with defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineRecord {
    input_start: u32,
    file_id: u32,
    repeat: u32,
    output_start: u32,
    increment: u32,
}

impl LineRecord {
    fn parse(text: &str, last_file_id: u32) -> Option<Self> {
        let caps = LINE_RECORD.captures(text)?;
        let number = |i: usize, default: u32| -> Option<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(default),
            }
        };
        Some(Self {
            input_start: number(1, 0)?,
            file_id: number(2, last_file_id)?,
            repeat: number(3, 1)?,
            output_start: number(4, 0)?,
            increment: number(5, 1)?,
        })
    }

    /// Input line `start + i` owns output lines
    /// `[out + i * inc, out + (i + 1) * inc)`; an increment of zero maps the
    /// single output line `out`. Lines already mapped keep their target.
    fn expand_into(&self, lines: &mut BTreeMap<u32, LineTarget>) {
        let span = u64::from(self.increment.max(1));
        for i in 0..u64::from(self.repeat) {
            let Ok(input) = u32::try_from(u64::from(self.input_start) + i) else {
                break;
            };
            let base = u64::from(self.output_start) + i * u64::from(self.increment);
            for output in base..base + span {
                let Ok(output) = u32::try_from(output) else {
                    return;
                };
                if let Entry::Vacant(slot) = lines.entry(output) {
                    slot.insert(LineTarget { file_id: self.file_id, line: input });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blob(files: &str, records: &str) -> String {
        format!("SMAP\nHello_jsp.java\nJSP\n*S JSP\n*F\n{files}*L\n{records}*E\n")
    }

    fn mapped(map: &DebugMap) -> Vec<(u32, u32, u32)> {
        map.lines.iter().map(|(o, t)| (*o, t.file_id, t.line)).collect()
    }

    #[test]
    fn test_repeat_with_increment() {
        let map = DebugMap::decode(&blob("+ 0 a.jsp\n/a.jsp\n+ 1 b.jsp\n/b.jsp\n", "10#1,3:20,2\n")).unwrap();
        assert_eq!(
            mapped(&map),
            vec![(20, 1, 10), (21, 1, 10), (22, 1, 11), (23, 1, 11), (24, 1, 12), (25, 1, 12)]
        );
    }

    #[test]
    fn test_first_writer_wins() {
        let map = DebugMap::decode(&blob("0 a.jsp\n", "1:10,3\n5:11\n7,2:12\n")).unwrap();
        assert_eq!(
            mapped(&map),
            vec![(10, 0, 1), (11, 0, 1), (12, 0, 1), (13, 0, 8)]
        );
    }

    #[test]
    fn test_file_id_carries_over() {
        let map = DebugMap::decode(&blob("0 a.jsp\n1 b.jsp\n", "1#1:5\n2:6\n3#0:7\n4:8\n")).unwrap();
        assert_eq!(mapped(&map), vec![(5, 1, 1), (6, 1, 2), (7, 0, 3), (8, 0, 4)]);
    }

    #[test]
    fn test_zero_increment_maps_base_line() {
        let map = DebugMap::decode(&blob("0 a.jsp\n", "3,4:9,0\n")).unwrap();
        assert_eq!(mapped(&map), vec![(9, 0, 3)]);
    }

    #[test]
    fn test_lookup_and_primary() {
        let map = DebugMap::decode(&blob("+ 0 hello.jsp\n/dir/hello.jsp\n+ 1 inc.jspf\n/dir/inc.jspf\n", "1:20\n1#1:21\n")).unwrap();
        let strata = StrataTable::default();

        let pos = map.lookup(20).unwrap();
        assert_eq!((pos.file.path.as_str(), pos.line), ("/dir/hello.jsp", 1));
        assert!(map.is_primary(&pos, &strata));

        let pos = map.lookup(21).unwrap();
        assert_eq!(pos.file.name, "inc.jspf");
        assert!(!map.is_primary(&pos, &strata));

        assert!(map.lookup(22).is_none());
    }

    #[test]
    fn test_kotlin_map() {
        let text = "SMAP\nMain.kt\nKotlin\n*S Kotlin\n*F\n+ 1 Main.kt\ncom/example/MainKt\n+ 2 PsiUtils.kt\norg/jetbrains/kotlin/psi/psiUtil/PsiUtilsKt\n*L\n1#1,10:1\n20#2:50\n*E\n*S KotlinDebug\n*F\n+ 1 Main.kt\ncom/example/MainKt\n*L\n1#1:99\n*E\n";
        let map = DebugMap::decode(text).unwrap();
        let strata = StrataTable::default();

        assert_eq!(map.stratum, "Kotlin");
        assert_eq!(map.files[&1].path, "com/example/Main.kt");
        assert_eq!(map.files[&2].path, "org/jetbrains/kotlin/psi/psiUtil/PsiUtils.kt");

        let pos = map.lookup(5).unwrap();
        assert_eq!(pos.line, 5);
        assert!(map.is_primary(&pos, &strata));
        assert!(!map.is_primary(&map.lookup(50).unwrap(), &strata));
        // Second stratum is ignored
        assert!(map.lookup(99).is_none());
    }

    #[test]
    fn test_line_endings() {
        let text = "SMAP\r\nA.java\rJSP\r\n*S JSP\n*F\r\n0 a.jsp\r*L\r\n1:1\r\n";
        let map = DebugMap::decode(text).unwrap();
        assert_eq!(map.generated_file, "A.java");
        assert_eq!(mapped(&map), vec![(1, 0, 1)]);
    }

    #[test]
    fn test_eof_after_line_marker_is_accepted() {
        let map = DebugMap::decode("SMAP\nA.java\nJSP\n*S JSP\n*F\n0 a.jsp\n*L\n").unwrap();
        assert!(map.lines.is_empty());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            DebugMap::decode("SMAP\nA.java\n"),
            Err(DebugMapError::UnexpectedEof { section: "header", line: 3 })
        );
        assert!(matches!(
            DebugMap::decode("SMAQ\nA.java\nJSP\n*S JSP\n*F\n*L\n"),
            Err(DebugMapError::BadHeader { line: 1, .. })
        ));
        assert!(matches!(
            DebugMap::decode("SMAP\nA.java\nJSP\n*X JSP\n*F\n*L\n"),
            Err(DebugMapError::BadHeader { line: 4, .. })
        ));
        assert_eq!(
            DebugMap::decode("SMAP\nA.java\nJSP\n*S JSP\n*F\n0 a.jsp\n"),
            Err(DebugMapError::UnexpectedEof { section: "file section", line: 7 })
        );
        assert!(matches!(
            DebugMap::decode("SMAP\nA.java\nJSP\n*S JSP\n*F\nzero a.jsp\n*L\n"),
            Err(DebugMapError::BadFileEntry { line: 6, .. })
        ));
        assert!(matches!(
            DebugMap::decode("SMAP\nA.java\nJSP\n*S JSP\n*F\n0 a.jsp\n*L\n1:x\n"),
            Err(DebugMapError::BadLineRecord { line: 8, .. })
        ));
        assert_eq!(
            DebugMap::decode("SMAP\nA.java\nJSP\n*S JSP\n*F\n0 a.jsp\n*L\n1#3:1\n"),
            Err(DebugMapError::UnknownFile { file_id: 3, line: 8 })
        );
    }

    #[test]
    fn test_oversized_numbers_are_rejected() {
        let err = DebugMap::decode(&blob("0 a.jsp\n", "99999999999:1\n")).unwrap_err();
        assert!(matches!(err, DebugMapError::BadLineRecord { .. }));
    }

    #[test]
    fn test_output_past_u32_is_dropped() {
        let map = DebugMap::decode(&blob("0 a.jsp\n", "1,3:4294967294\n")).unwrap();
        assert_eq!(mapped(&map), vec![(4294967294, 0, 1), (4294967295, 0, 2)]);
    }

    #[test]
    fn test_file_path_rule() {
        assert_eq!(file_path("a.jsp", None), "a.jsp");
        assert_eq!(file_path("a.jsp", Some("/web/a.jsp")), "/web/a.jsp");
        assert_eq!(file_path("Util.kt", Some("pkg/sub/OtherKt")), "pkg/sub/Util.kt");
        assert_eq!(file_path("Util.kt", Some("NoDir")), "Util.kt");
    }

    #[test]
    fn test_listing() {
        let map = DebugMap::decode(&blob("+ 0 a.jsp\n/a.jsp\n", "1,2:3\n")).unwrap();
        insta::assert_snapshot!(map.to_listing(), @r"
        generated: Hello_jsp.java
        stratum: JSP (default JSP)
        file 0: a.jsp -> /a.jsp
        3 -> 0#1
        4 -> 0#2
        ");
    }
}

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of error, for display in tooling output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedEof,
    BadHeader,
    BadFileEntry,
    BadLineRecord,
    UnknownFile,
    BadClassFile,
    UnknownCharset,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedEof => "Unexpected end of debug map",
            ErrorKind::BadHeader => "Malformed debug map header",
            ErrorKind::BadFileEntry => "Malformed file entry",
            ErrorKind::BadLineRecord => "Malformed line record",
            ErrorKind::UnknownFile => "Unknown file id",
            ErrorKind::BadClassFile => "Malformed class file",
            ErrorKind::UnknownCharset => "Unknown charset",
            ErrorKind::Io => "I/O error",
            ErrorKind::Config => "Invalid configuration",
        }
    }
}

/// Structural problem in a debug map. Lines are 1-indexed into the blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugMapError {
    #[error("line {line}: input ended while reading the {section}")]
    UnexpectedEof { section: &'static str, line: usize },

    #[error("line {line}: expected {expected}, found `{found}`")]
    BadHeader { line: usize, expected: &'static str, found: String },

    #[error("line {line}: malformed file entry `{text}`")]
    BadFileEntry { line: usize, text: String },

    #[error("line {line}: malformed line record `{text}`")]
    BadLineRecord { line: usize, text: String },

    #[error("line {line}: record refers to undeclared file id {file_id}")]
    UnknownFile { file_id: u32, line: usize },
}

impl DebugMapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DebugMapError::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            DebugMapError::BadHeader { .. } => ErrorKind::BadHeader,
            DebugMapError::BadFileEntry { .. } => ErrorKind::BadFileEntry,
            DebugMapError::BadLineRecord { .. } => ErrorKind::BadLineRecord,
            DebugMapError::UnknownFile { .. } => ErrorKind::UnknownFile,
        }
    }

    /// Blob line the error points at
    pub fn line(&self) -> usize {
        match self {
            DebugMapError::UnexpectedEof { line, .. }
            | DebugMapError::BadHeader { line, .. }
            | DebugMapError::BadFileEntry { line, .. }
            | DebugMapError::BadLineRecord { line, .. }
            | DebugMapError::UnknownFile { line, .. } => *line,
        }
    }

    fn message(&self) -> String {
        match self {
            DebugMapError::UnexpectedEof { section, .. } => {
                format!("input ended while reading the {section}")
            }
            DebugMapError::BadHeader { expected, .. } => format!("expected {expected}"),
            DebugMapError::BadFileEntry { .. } => "malformed file entry".to_string(),
            DebugMapError::BadLineRecord { .. } => "malformed line record".to_string(),
            DebugMapError::UnknownFile { file_id, .. } => {
                format!("record refers to undeclared file id {file_id}")
            }
        }
    }

    /// Render the error with the offending blob line (for terminal display)
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, true)
    }

    fn render_inner(&self, source: &str, filename: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        let line = self.line();
        output.push_str(&format!(" {}file:{} {}:{}\n", dim, reset, filename, line));
        output.push_str(&format!("{}error:{} {}\n", red, reset, self.message()));

        // Source context; absent for end-of-input errors
        let source_line = source.lines().nth(line.saturating_sub(1)).filter(|_| line > 0);
        if let Some(source_line) = source_line {
            let width = line.to_string().len().max(2);
            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = width));
            output.push_str(&format!("{}{:>width$} |{} {}\n", dim, line, reset, source_line, width = width));

            let start = source_line.chars().count() - source_line.trim_start().chars().count();
            let len = source_line.trim().chars().count().max(1);
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}\n",
                dim,
                "",
                reset,
                " ".repeat(start),
                red,
                "^".repeat(len),
                reset,
                width = width
            ));
        }

        output
    }
}

/// Malformed class-file image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    #[error("class file truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("constant pool entry {index} has unknown tag {tag}")]
    BadConstant { index: u16, tag: u8 },

    #[error("constant pool entry {index} is not valid modified UTF-8")]
    BadUtf8 { index: u16 },
}

/// Failure of the markup parse entrypoint. Tokenizing never fails; only
/// obtaining and decoding the bytes can.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown charset `{0}`")]
    UnknownCharset(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::UnknownCharset(_) => ErrorKind::UnknownCharset,
            ParseError::Io(_) => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io { .. } => ErrorKind::Io,
            ConfigError::Toml(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB: &str = "SMAP\nHello.java\nJSP\n*S JSP\n*F\n+ 0 hello.jsp\n/hello.jsp\n*L\n1,x:10\n*E\n";

    #[test]
    fn test_render_points_at_line() {
        let err = DebugMapError::BadLineRecord { line: 9, text: "1,x:10".to_string() };
        insta::assert_snapshot!(err.render(BLOB, "Hello.class"), @r"
         file: Hello.class:9
        error: malformed line record
           |
         9 | 1,x:10
           | ^^^^^^
        ");
    }

    #[test]
    fn test_carets_align_after_wide_whitespace() {
        let err = DebugMapError::BadLineRecord { line: 2, text: "\u{3000}1,x:10".to_string() };
        let rendered = err.render("*L\n\u{3000}1,x:10\n", "a.smap");
        assert!(rendered.ends_with("   |  ^^^^^^\n"), "{rendered}");
    }

    #[test]
    fn test_render_end_of_input() {
        let err = DebugMapError::UnexpectedEof { section: "header", line: 3 };
        let rendered = err.render("SMAP\nA.java\n", "A.class");
        assert!(rendered.contains("A.class:3"));
        assert!(rendered.contains("input ended while reading the header"));
        assert!(!rendered.contains('^'));
    }

    #[test]
    fn test_render_color_marks_error() {
        let err = DebugMapError::BadHeader { line: 1, expected: "`SMAP`", found: "SMAQ".to_string() };
        let rendered = err.render_color("SMAQ\n", "x.smap");
        assert!(rendered.contains("\x1b[1;31merror:\x1b[0m expected `SMAP`"));
    }

    #[test]
    fn test_display_and_kind() {
        let err = DebugMapError::UnknownFile { file_id: 4, line: 12 };
        assert_eq!(err.to_string(), "line 12: record refers to undeclared file id 4");
        assert_eq!(err.kind().as_str(), "Unknown file id");
    }
}

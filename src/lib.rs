//! Source-location recovery for generated code.
//!
//! Two jobs:
//! - tokenize server-page markup into position-annotated nodes, link the tag
//!   tree and classify every line ([`markup`])
//! - map a line of a generated class back to the authored source, through
//!   the class's debug map ([`smap`]) or, failing that, through the naming
//!   conventions template compilers use ([`mangle`], [`resolve`])
//!
//! Everything works on in-memory buffers; callers own the I/O policy and
//! any parallelism across files.

pub mod classfile;
pub mod config;
pub mod error;
pub mod mangle;
pub mod markup;
pub mod resolve;
pub mod smap;

pub use classfile::{read_debug_info, ClassDebugInfo};
pub use config::Config;
pub use error::{ClassFileError, ConfigError, DebugMapError, ErrorKind, ParseError};
pub use mangle::{decode_identifier, decode_identifier_path, encode_identifier, NamingConventions};
pub use markup::{parse, parse_files, parse_str, Document, LineMetrics, Node, PageLexer};
pub use resolve::{resolve, Origin, ResolvedLocation, Resolver, SourceIndex, SourceTree};
pub use smap::{decode_debug_map, DebugMap, StrataTable, StratumRule};

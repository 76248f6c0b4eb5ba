//! Maps a (class name, generated line) pair back to authored source.
//!
//! Resolution order:
//! 1. the class's debug map, passed in or read from the class file
//! 2. page paths decoded from a compiled-template class name
//! 3. the Java source path implied by an ordinary class name
//!
//! Steps 2 and 3 only succeed for paths that exist in the source index.

pub mod sources;

pub use sources::{SourceIndex, SourceMatch, SourceTree};

use crate::classfile::{read_debug_info, ClassDebugInfo};
use crate::mangle::{java_source_path, java_source_path_from_attribute, NamingConventions};
use crate::smap::{DebugMap, StrataTable};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which evidence produced a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    DebugMap,
    MangledName,
    ClassName,
}

/// Authored-source location of a generated line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    /// Source identifier: the debug map's file path, or the matched path
    /// relative to its source root
    pub source: String,
    /// File on disk, when the source was found in the index
    pub file: Option<PathBuf>,
    /// Line in the source; unknown when only the file could be recovered
    pub line: Option<u32>,
    pub is_primary: bool,
    pub origin: Origin,
}

pub struct Resolver<'a, I: SourceIndex + ?Sized> {
    index: &'a I,
    conventions: NamingConventions,
    strata: StrataTable,
}

impl<'a, I: SourceIndex + ?Sized> Resolver<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self {
            index,
            conventions: NamingConventions::default(),
            strata: StrataTable::default(),
        }
    }

    pub fn with_conventions(mut self, conventions: NamingConventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_strata(mut self, strata: StrataTable) -> Self {
        self.strata = strata;
        self
    }

    /// Resolve `line` of `class_name`. `debug_blob` takes precedence over a
    /// debug map embedded in `class_file`.
    pub fn resolve(
        &self,
        class_name: &str,
        line: u32,
        debug_blob: Option<&str>,
        class_file: Option<&[u8]>,
    ) -> Option<ResolvedLocation> {
        let info = class_file.and_then(|bytes| match read_debug_info(bytes) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(class = class_name, error = %e, "unreadable class file");
                None
            }
        });
        self.resolve_with(class_name, line, debug_blob, info.as_ref())
    }

    /// Resolve using a class file on disk. Without an embedded debug map,
    /// a sibling `<class file>.smap` is used.
    pub fn resolve_class_file(&self, class_name: &str, line: u32, class_file: &Path) -> Option<ResolvedLocation> {
        let info = match fs::read(class_file) {
            Ok(bytes) => match read_debug_info(&bytes) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(path = %class_file.display(), error = %e, "unreadable class file");
                    None
                }
            },
            Err(e) => {
                warn!(path = %class_file.display(), error = %e, "failed to open class file");
                None
            }
        };

        let sidecar = match info.as_ref().and_then(|i| i.debug_extension.as_ref()) {
            Some(_) => None,
            None => read_sidecar(class_file),
        };

        self.resolve_with(class_name, line, sidecar.as_deref(), info.as_ref())
    }

    fn resolve_with(
        &self,
        class_name: &str,
        line: u32,
        debug_blob: Option<&str>,
        info: Option<&ClassDebugInfo>,
    ) -> Option<ResolvedLocation> {
        let blob = debug_blob.or_else(|| info.and_then(|i| i.debug_extension.as_deref()));

        match blob {
            Some(blob) => {
                if let Some(location) = self.from_debug_map(class_name, line, blob) {
                    return Some(location);
                }
            }
            None => debug!(class = class_name, "no debug map for class"),
        }

        let location = if self.conventions.is_template_class(class_name) {
            self.from_template_name(class_name)
        } else {
            self.from_class_name(class_name, line, info.and_then(|i| i.source_file.as_deref()))
        };

        if location.is_none() {
            debug!(class = class_name, line, "unresolved location");
        }
        location
    }

    fn from_debug_map(&self, class_name: &str, line: u32, blob: &str) -> Option<ResolvedLocation> {
        let map = match DebugMap::decode(blob) {
            Ok(map) => map,
            Err(e) => {
                debug!(class = class_name, error = %e, "debug map unusable, falling back to class name");
                return None;
            }
        };

        let Some(position) = map.lookup(line) else {
            debug!(class = class_name, line, "line not covered by debug map");
            return None;
        };

        Some(ResolvedLocation {
            source: position.file.path.clone(),
            file: self.index.find(&position.file.path).map(|m| m.path()),
            line: Some(position.line),
            is_primary: map.is_primary(&position, &self.strata),
            origin: Origin::DebugMap,
        })
    }

    fn from_template_name(&self, class_name: &str) -> Option<ResolvedLocation> {
        self.conventions
            .template_candidates(class_name)
            .iter()
            .find_map(|candidate| self.index.find(candidate))
            .map(|found| ResolvedLocation {
                file: Some(found.path()),
                source: found.relative,
                line: None,
                is_primary: false,
                origin: Origin::MangledName,
            })
    }

    fn from_class_name(&self, class_name: &str, line: u32, source_file: Option<&str>) -> Option<ResolvedLocation> {
        let mut candidates = vec![java_source_path(class_name)];
        if let Some(source_file) = source_file {
            let from_attribute = java_source_path_from_attribute(class_name, source_file);
            if !candidates.contains(&from_attribute) {
                candidates.push(from_attribute);
            }
        }

        candidates
            .iter()
            .find_map(|candidate| self.index.find(candidate))
            .map(|found| ResolvedLocation {
                file: Some(found.path()),
                source: found.relative,
                line: Some(line),
                is_primary: true,
                origin: Origin::ClassName,
            })
    }
}

fn read_sidecar(class_file: &Path) -> Option<String> {
    let mut sidecar = class_file.as_os_str().to_owned();
    sidecar.push(".smap");
    let sidecar = PathBuf::from(sidecar);
    if !sidecar.exists() {
        debug!(path = %sidecar.display(), "no sidecar debug map");
        return None;
    }
    match fs::read(&sidecar) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!(path = %sidecar.display(), error = %e, "failed to read sidecar debug map");
            None
        }
    }
}

/// Resolve with the default conventions and strata
pub fn resolve<I: SourceIndex + ?Sized>(
    index: &I,
    class_name: &str,
    line: u32,
    debug_blob: Option<&str>,
    class_file: Option<&[u8]>,
) -> Option<ResolvedLocation> {
    Resolver::new(index).resolve(class_name, line, debug_blob, class_file)
}

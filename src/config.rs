use crate::error::ConfigError;
use crate::mangle::NamingConventions;
use crate::resolve::{Resolver, SourceIndex, SourceTree};
use crate::smap::StrataTable;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for locating sources, usually read from a TOML file:
///
/// ```toml
/// source_roots = ["src/main/java", "src/main/webapp"]
/// charset = "UTF-8"
///
/// [conventions]
/// package_prefixes = ["jsp/", "org/apache/jsp/"]
///
/// [[strata.rules]]
/// name = "Kotlin"
/// primary_file = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_roots: Vec<PathBuf>,
    pub conventions: NamingConventions,
    pub strata: StrataTable,
    /// Charset label for page sources
    pub charset: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_roots: Vec::new(),
            conventions: NamingConventions::default(),
            strata: StrataTable::default(),
            charset: "UTF-8".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file; relative source roots are taken relative to the
    /// file's directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            for root in &mut config.source_roots {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
        Ok(config)
    }

    /// Index the configured source roots
    pub fn source_tree(&self) -> SourceTree {
        SourceTree::scan(&self.source_roots)
    }

    /// Resolver over `index` using this config's conventions and strata
    pub fn resolver<'a, I: SourceIndex + ?Sized>(&self, index: &'a I) -> Resolver<'a, I> {
        Resolver::new(index)
            .with_conventions(self.conventions.clone())
            .with_strata(self.strata.clone())
    }
}

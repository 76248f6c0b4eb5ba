use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A candidate path found under a source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMatch {
    pub root: PathBuf,
    /// Path relative to `root`, `/`-separated
    pub relative: String,
}

impl SourceMatch {
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.relative)
    }
}

/// Lookup of candidate source paths. A candidate matches any known file
/// whose relative path is the candidate or ends with `/candidate`.
pub trait SourceIndex {
    fn find(&self, candidate: &str) -> Option<SourceMatch>;
}

fn matches_candidate(relative: &str, candidate: &str) -> bool {
    relative == candidate
        || (relative.len() > candidate.len()
            && relative.ends_with(candidate)
            && relative.as_bytes()[relative.len() - candidate.len() - 1] == b'/')
}

fn normalize_candidate(candidate: &str) -> Option<&str> {
    let candidate = candidate.trim_start_matches('/');
    (!candidate.is_empty()).then_some(candidate)
}

/// Files under a set of source directories, listed once up front
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    roots: Vec<PathBuf>,
    /// (root index, relative path)
    files: Vec<(usize, String)>,
}

impl SourceTree {
    pub fn scan<P: AsRef<Path>>(roots: &[P]) -> Self {
        let mut tree = SourceTree::default();

        for root in roots {
            let root = root.as_ref();
            if !root.is_dir() {
                warn!(root = %root.display(), "source root is not a directory");
                continue;
            }
            let index = tree.roots.len();
            tree.roots.push(root.to_path_buf());

            for entry in WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Ok(relative) = entry.path().strip_prefix(root) else {
                    continue;
                };
                let relative: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                tree.files.push((index, relative.join("/")));
            }
        }

        debug!(roots = tree.roots.len(), files = tree.files.len(), "indexed source roots");
        tree
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceIndex for SourceTree {
    fn find(&self, candidate: &str) -> Option<SourceMatch> {
        let candidate = normalize_candidate(candidate)?;
        self.files
            .iter()
            .find(|(_, relative)| matches_candidate(relative, candidate))
            .map(|(root, relative)| SourceMatch {
                root: self.roots[*root].clone(),
                relative: relative.clone(),
            })
    }
}

/// In-memory list of relative paths
impl<S: AsRef<str>> SourceIndex for [S] {
    fn find(&self, candidate: &str) -> Option<SourceMatch> {
        let candidate = normalize_candidate(candidate)?;
        self.iter()
            .map(AsRef::as_ref)
            .find(|relative| matches_candidate(relative, candidate))
            .map(|relative| SourceMatch {
                root: PathBuf::new(),
                relative: relative.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_suffix_matching() {
        let files = ["src/main/webapp/dir/page.jsp", "src/main/java/a/B.java", "xpage.jsp"];
        let found = files[..].find("dir/page.jsp").unwrap();
        assert_eq!(found.relative, "src/main/webapp/dir/page.jsp");
        assert_eq!(files[..].find("/a/B.java").unwrap().relative, "src/main/java/a/B.java");
        assert_eq!(files[..].find("page.jsp").unwrap().relative, "src/main/webapp/dir/page.jsp");
        assert!(files[..].find("age.jsp").is_none());
        assert!(files[..].find("/").is_none());
    }

    #[test]
    fn test_scan_roots() {
        let dir = tempfile::tempdir().unwrap();
        let java = dir.path().join("java");
        let web = dir.path().join("webapp");
        fs::create_dir_all(java.join("com/example")).unwrap();
        fs::create_dir_all(web.join("views")).unwrap();
        fs::write(java.join("com/example/App.java"), "class App {}").unwrap();
        fs::write(web.join("views/index.jsp"), "<p/>").unwrap();

        let tree = SourceTree::scan(&[java.clone(), web.clone(), dir.path().join("missing")]);
        assert_eq!(tree.len(), 2);

        let found = tree.find("views/index.jsp").unwrap();
        assert_eq!(found.root, web);
        assert_eq!(found.path(), web.join("views/index.jsp"));
        assert_eq!(tree.find("com/example/App.java").unwrap().root, java);
        assert!(tree.find("index.html").is_none());
    }
}

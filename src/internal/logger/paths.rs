// src/internal/logger/paths.rs

use std::path::{Component, Path, PathBuf};

/// Project root used to shorten source paths in log lines.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses the current working directory as the project root.
    pub fn from_current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the project root, or the input unchanged when it
    /// lies outside the project.
    pub fn relativize(&self, path: &str) -> String {
        self.project_relative(path)
            .unwrap_or_else(|| path.to_string())
    }

    /// Relative paths (as produced by `file!()`) are already rooted in the
    /// project. Absolute paths must live under the root.
    pub fn project_relative(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        let p = Path::new(path);
        if p.is_relative() {
            // `../` escapes the project
            if p.components().any(|c| matches!(c, Component::ParentDir)) {
                return None;
            }
            return Some(path.to_string());
        }
        p.strip_prefix(&self.root)
            .ok()
            .map(|rel| rel.to_string_lossy().into_owned())
    }
}

impl Default for ProjectPaths {
    fn default() -> Self {
        Self::from_current_dir().unwrap_or_else(|_| Self::new("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_inside_root_is_shortened() {
        let paths = ProjectPaths::new("/work/cfme_tests");
        assert_eq!(
            paths.relativize("/work/cfme_tests/cfme/tests/test_cli.rs"),
            "cfme/tests/test_cli.rs"
        );
    }

    #[test]
    fn test_absolute_outside_root_is_kept() {
        let paths = ProjectPaths::new("/work/cfme_tests");
        assert_eq!(paths.relativize("/usr/lib/thing.rs"), "/usr/lib/thing.rs");
        assert!(paths.project_relative("/usr/lib/thing.rs").is_none());
    }

    #[test]
    fn test_relative_paths_are_project_paths() {
        let paths = ProjectPaths::new("/work/cfme_tests");
        assert_eq!(paths.project_relative("src/lib.rs").as_deref(), Some("src/lib.rs"));
        assert!(paths.project_relative("../other/src/lib.rs").is_none());
        assert!(paths.project_relative("").is_none());
    }
}

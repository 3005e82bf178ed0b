//! Path-root matching for discovery roots and exclusions.
//!
//! Comparison is case-insensitive and separator-agnostic: `C:\Users\Me\`
//! and `c:/users/me` name the same root.

use std::path::{Path, PathBuf};

/// Normalize a path for root comparison.
///
/// Backslashes become `/`, trailing separators are trimmed and the result is
/// lowercased. Returns `None` for empty paths.
pub fn normalize_for_compare(path: &str) -> Option<String> {
    let mut value = path.trim().replace('\\', "/");
    while value.len() > 1 && value.ends_with('/') {
        value.pop();
    }
    let value = value.to_lowercase();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// A set of normalized path roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootSet {
    roots: Vec<String>,
}

impl RootSet {
    /// Build from raw paths; empty entries are ignored and duplicates dropped.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut roots: Vec<String> = paths
            .iter()
            .filter_map(|p| normalize_for_compare(&p.as_ref().to_string_lossy()))
            .collect();
        roots.sort();
        roots.dedup();
        RootSet { roots }
    }

    /// True when no roots are configured
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Normalized roots, sorted
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// True when `path` is one of the roots or lies underneath one.
    pub fn covers(&self, path: &str) -> bool {
        let Some(path) = normalize_for_compare(path) else {
            return false;
        };
        self.roots.iter().any(|root| is_at_or_under(&path, root))
    }

    /// The original roots as `PathBuf`s (normalized form)
    pub fn to_paths(&self) -> Vec<PathBuf> {
        self.roots.iter().map(PathBuf::from).collect()
    }
}

fn is_at_or_under(path: &str, root: &str) -> bool {
    if path == root {
        return true;
    }
    if root == "/" {
        return path.starts_with('/');
    }
    path.len() > root.len() && path.starts_with(root) && path.as_bytes()[root.len()] == b'/'
}

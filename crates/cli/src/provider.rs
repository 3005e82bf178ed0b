//! Filesystem walk provider.
//!
//! Reports every file and folder under the discovery roots, down to a
//! fixed depth. Hidden entries and excluded roots are not descended into.
//! Roots and exclusions come from the scope of each cycle, so a reloaded
//! config takes effect without rebuilding the provider.

use launchdex_core::{ChangeStamp, Error, ItemKind, ProviderId, Result, RootSet};
use launchdex_engine::{DiscoveredItem, DiscoveryProvider, DiscoveryScope};
use rustc_hash::FxHasher;
use std::fs::Metadata;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Provider id used for filesystem items.
pub const FS_PROVIDER_ID: &str = "filesystem";

/// Default walk depth below each root.
pub const DEFAULT_MAX_DEPTH: usize = 6;

const APP_EXTENSIONS: [&str; 4] = ["exe", "lnk", "app", "desktop"];

/// Walks discovery roots with `walkdir`.
pub struct FsWalkProvider {
    id: ProviderId,
    max_depth: usize,
}

impl Default for FsWalkProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FsWalkProvider {
    /// Provider walking [`DEFAULT_MAX_DEPTH`] levels below each root.
    pub fn new() -> Self {
        FsWalkProvider {
            id: ProviderId::from(FS_PROVIDER_ID),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the walk depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn walk_root(&self, root: &Path, excludes: &RootSet, out: &mut Vec<DiscoveredItem>) {
        let walker = WalkDir::new(root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !skip(entry, excludes));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(target: "launchdex::index", error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            if let Some(item) = discovered(&entry) {
                out.push(item);
            }
        }
    }
}

impl DiscoveryProvider for FsWalkProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    /// Fingerprint of the scope, the walk depth and the newest modification
    /// time among the roots and their direct children. Zero when no root is
    /// reachable.
    fn change_stamp(&self, scope: &DiscoveryScope) -> Result<ChangeStamp> {
        let mut newest = 0u64;
        let mut reachable = false;
        for root in &scope.roots {
            let Ok(meta) = std::fs::metadata(root) else {
                continue;
            };
            reachable = true;
            newest = newest.max(modified_micros(&meta));
            if let Ok(children) = std::fs::read_dir(root) {
                for child in children.flatten() {
                    if let Ok(meta) = child.metadata() {
                        newest = newest.max(modified_micros(&meta));
                    }
                }
            }
        }
        if !reachable {
            return Ok(ChangeStamp::ZERO);
        }

        let mut hasher = FxHasher::default();
        RootSet::new(&scope.roots).roots().hash(&mut hasher);
        scope.excludes.roots().hash(&mut hasher);
        self.max_depth.hash(&mut hasher);
        newest.hash(&mut hasher);
        Ok(ChangeStamp::new(hasher.finish().max(1)))
    }

    fn scan(&self, scope: &DiscoveryScope) -> Result<Vec<DiscoveredItem>> {
        let mut items = Vec::new();
        let mut reachable = 0;
        for root in &scope.roots {
            if !root.is_dir() {
                debug!(target: "launchdex::index", root = %root.display(), "Discovery root missing");
                continue;
            }
            reachable += 1;
            self.walk_root(root, &scope.excludes, &mut items);
        }
        // A complete scan with every root gone would prune the whole index.
        if reachable == 0 && !scope.roots.is_empty() {
            return Err(Error::provider_scan(
                self.id.clone(),
                "no discovery root is reachable",
            ));
        }
        Ok(items)
    }
}

/// Hidden entries and excluded paths are neither reported nor descended.
fn skip(entry: &DirEntry, excludes: &RootSet) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let hidden = entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false);
    hidden || excludes.covers(&entry.path().to_string_lossy())
}

fn discovered(entry: &DirEntry) -> Option<DiscoveredItem> {
    let path = entry.path();
    let meta = entry.metadata().ok()?;
    let kind = if meta.is_dir() {
        ItemKind::Folder
    } else if meta.is_file() {
        kind_for_file(path)
    } else {
        return None;
    };
    let display = path.to_string_lossy().into_owned();
    let title = entry.file_name().to_string_lossy().into_owned();
    let stamp = ChangeStamp::new(modified_micros(&meta).max(1));
    Some(DiscoveredItem::new(
        format!("{}:{}", kind.as_str(), display),
        kind,
        title,
        display,
        stamp,
    ))
}

fn kind_for_file(path: &Path) -> ItemKind {
    let is_app = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            APP_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);
    if is_app {
        ItemKind::App
    } else {
        ItemKind::File
    }
}

fn modified_micros(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("reports/archive")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("reports/Q4_Report.xlsx"), b"q4").unwrap();
        fs::write(root.join("reports/archive/old.txt"), b"old").unwrap();
        fs::write(root.join(".cache/blob"), b"blob").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), b"js").unwrap();
        fs::write(root.join("Tool.exe"), b"bin").unwrap();
        temp
    }

    fn scope(roots: &[PathBuf]) -> DiscoveryScope {
        DiscoveryScope::new(roots.to_vec(), RootSet::default())
    }

    fn titles(items: &[DiscoveredItem]) -> Vec<&str> {
        items.iter().map(|item| item.title.as_str()).collect()
    }

    #[test]
    fn test_scan_reports_files_and_folders() {
        let temp = tree();
        let provider = FsWalkProvider::new();
        let items = provider.scan(&scope(&[temp.path().to_path_buf()])).unwrap();
        let titles = titles(&items);
        assert!(titles.contains(&"Q4_Report.xlsx"));
        assert!(titles.contains(&"archive"));
        assert!(titles.contains(&"old.txt"));
        assert!(!titles.contains(&"blob"));
        assert!(!titles.contains(&".cache"));

        let tool = items.iter().find(|item| item.title == "Tool.exe").unwrap();
        assert_eq!(tool.kind, ItemKind::App);
        assert!(tool.id.as_str().starts_with("app:"));
        let folder = items.iter().find(|item| item.title == "reports").unwrap();
        assert_eq!(folder.kind, ItemKind::Folder);
        assert!(items.iter().all(|item| item.change_stamp > ChangeStamp::ZERO));
    }

    #[test]
    fn test_scan_skips_excluded_roots() {
        let temp = tree();
        let excludes = RootSet::new(&[temp.path().join("NODE_MODULES")]);
        let scope = DiscoveryScope::new(vec![temp.path().to_path_buf()], excludes);
        let items = FsWalkProvider::new().scan(&scope).unwrap();
        assert!(!titles(&items).contains(&"index.js"));
        assert!(!titles(&items).contains(&"node_modules"));
    }

    #[test]
    fn test_scan_respects_depth() {
        let temp = tree();
        let provider = FsWalkProvider::new().with_max_depth(1);
        let items = provider.scan(&scope(&[temp.path().to_path_buf()])).unwrap();
        assert!(titles(&items).contains(&"reports"));
        assert!(!titles(&items).contains(&"Q4_Report.xlsx"));
    }

    #[test]
    fn test_missing_roots_fail_soft() {
        let temp = TempDir::new().unwrap();
        let gone = scope(&[temp.path().join("gone")]);
        let provider = FsWalkProvider::new();
        assert!(provider.scan(&gone).is_err());
        assert_eq!(provider.change_stamp(&gone).unwrap(), ChangeStamp::ZERO);
        assert!(provider.scan(&scope(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_change_stamp_is_stable_without_changes() {
        let temp = tree();
        let provider = FsWalkProvider::new();
        let scope = scope(&[temp.path().to_path_buf()]);
        let first = provider.change_stamp(&scope).unwrap();
        assert!(first > ChangeStamp::ZERO);
        assert_eq!(provider.change_stamp(&scope).unwrap(), first);
    }

    #[test]
    fn test_change_stamp_follows_scope() {
        let home = tree();
        let extra = TempDir::new().unwrap();
        fs::write(extra.path().join("notes.txt"), b"n").unwrap();
        let provider = FsWalkProvider::new();

        let one = scope(&[home.path().to_path_buf()]);
        let both = scope(&[home.path().to_path_buf(), extra.path().to_path_buf()]);
        let excluding = DiscoveryScope::new(
            one.roots.clone(),
            RootSet::new(&[home.path().join("reports")]),
        );

        let base = provider.change_stamp(&one).unwrap();
        assert_ne!(provider.change_stamp(&both).unwrap(), base);
        assert_ne!(provider.change_stamp(&excluding).unwrap(), base);
        assert_eq!(provider.change_stamp(&one).unwrap(), base);
    }
}

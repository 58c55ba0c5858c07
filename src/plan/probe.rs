use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

/// Existence checks against the project tree, keyed by forward-slash
/// paths relative to the project root.
pub trait ProjectProbe {
    fn file_exists(&self, path: &str) -> bool;
    fn dir_exists(&self, path: &str) -> bool;
    /// Whether any file lives somewhere below `dir`.
    fn has_files_under(&self, dir: &str) -> bool;
}

/// Directories never descended into while capturing a snapshot.
pub const SKIPPED_DIRS: &[&str] = &[".git", "target", "bin", "obj", "node_modules"];

/// The project tree as seen at one moment.
///
/// Captured once per planning pass; every probe answers from memory so the
/// plan is consistent even if the tree changes underneath.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSnapshot {
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
}

impl ProbeSnapshot {
    /// Walk `root`. A missing root is an empty project.
    pub fn capture(root: &Path) -> Self {
        let mut snapshot = Self::default();
        if !root.is_dir() {
            tracing::debug!(root = %root.display(), "project root does not exist yet");
            return snapshot;
        }

        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && SKIPPED_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
            })
            .filter_map(|e| e.ok());

        for entry in walker {
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let key = normalize_key(&rel.to_string_lossy());
            if entry.file_type().is_dir() {
                snapshot.dirs.insert(key);
            } else {
                snapshot.files.insert(key);
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = snapshot.files.len(),
            dirs = snapshot.dirs.len(),
            "captured project snapshot"
        );
        snapshot
    }

    /// Build a snapshot from relative paths. Entries ending in `/` are
    /// directories; every file implies its parent directories.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut snapshot = Self::default();
        for path in paths {
            let raw = path.as_ref();
            let key = normalize_key(raw);
            if key.is_empty() {
                continue;
            }
            let is_dir = raw.ends_with('/') || raw.ends_with('\\');
            let mut parent = if is_dir {
                Some(key.as_str())
            } else {
                key.rsplit_once('/').map(|(dir, _)| dir)
            };
            while let Some(dir) = parent {
                snapshot.dirs.insert(dir.to_string());
                parent = dir.rsplit_once('/').map(|(up, _)| up);
            }
            if !is_dir {
                snapshot.files.insert(key);
            }
        }
        snapshot
    }
}

impl ProjectProbe for ProbeSnapshot {
    fn file_exists(&self, path: &str) -> bool {
        self.files.contains(&normalize_key(path))
    }

    fn dir_exists(&self, path: &str) -> bool {
        let key = normalize_key(path);
        key.is_empty() || self.dirs.contains(&key)
    }

    fn has_files_under(&self, dir: &str) -> bool {
        let key = normalize_key(dir);
        if key.is_empty() {
            return !self.files.is_empty();
        }
        let prefix = format!("{key}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|f| f.starts_with(&prefix))
    }
}

fn normalize_key(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

//! Filesystem adapter: directory pruning during discovery, glob expansion
//! against tracked files for the `copy` pre-image and the manifest's own
//! input set, and purging an image directory's untracked output before a
//! build.

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories that are never descended into during repository discovery:
/// VCS metadata, tool caches, build output, dependency caches, and virtualenvs.
pub const PRUNED_DIRS: &[&str] = &[
    ".git",
    ".mypy_cache",
    "target",
    "target-ra",
    "target-xcompile",
    "mzdata",
    "node_modules",
    "venv",
];

fn is_pruned(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| PRUNED_DIRS.contains(&name))
        .unwrap_or(false)
}

/// Walk `root`, yielding every file not under a pruned directory.
pub fn walk_tracked_files(root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_pruned(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
}

/// Expand `pattern` against every tracked file under `dir`, returning
/// absolute paths. Patterns are matched against the path relative to `dir`.
pub fn expand_glob(dir: &Path, pattern: &str) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let compiled =
        Pattern::new(pattern).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let mut matches = Vec::new();
    for path in walk_tracked_files(dir) {
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        if compiled.matches_path(relative) {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

/// Remove every untracked file under `path` (`git clean -ffdX`), so a
/// partial output tree left by a cancelled build doesn't leak into the
/// next run's input set.
pub fn purge_untracked(path: &Path) -> std::io::Result<()> {
    let path_str = path.to_string_lossy();
    let output = duct::cmd("git", ["clean", "-ffdX", path_str.as_ref()])
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()?;
    if !output.status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!(
                "git clean failed in '{}': {}",
                path.display(),
                String::from_utf8_lossy(&output.stdout)
            ),
        ));
    }
    Ok(())
}

//! The canonical content hash computed over an image's inputs, pre-image
//! metadata, build axes, and the fingerprints of its dependencies.
//!
//! The algorithm is fixed by the system this orchestrator descends from and
//! must not drift: any change here changes every published tag.

use data_encoding::BASE32_NOPAD;
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// A 20-byte content hash, textually rendered as unpadded base32 so it
/// reads as visually distinct from a hex VCS commit hash and is safe as a
/// container tag suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 20]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE32_NOPAD.encode(&self.0))
    }
}

/// Simplified file mode used by the fingerprint algorithm: only symlink,
/// executable, and "everything else" are distinguished, so a permission
/// bit flip that doesn't change executability doesn't perturb the hash.
fn simplified_mode(path: &Path) -> std::io::Result<u16> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(0o120000);
    }
    let mode = metadata.permissions().mode();
    if mode & 0o100 != 0 {
        Ok(0o100755)
    } else {
        Ok(0o100644)
    }
}

fn content_digest(path: &Path) -> std::io::Result<[u8; 20]> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

/// Accumulates the `self_hash` for one image: per-input mode, path, and
/// content digest, then each pre-image's `extra()`, then the axis literals.
pub struct SelfHasher {
    hasher: Sha1,
}

impl SelfHasher {
    pub fn new() -> Self {
        Self { hasher: Sha1::new() }
    }

    /// Feed one input file, identified by its path relative to the image's
    /// root. `relative_path` must use `/` separators so the hash is stable
    /// across platforms.
    pub fn feed_input(
        &mut self,
        absolute_path: &Path,
        relative_path: &str,
    ) -> std::io::Result<()> {
        let mode = simplified_mode(absolute_path)?;
        let digest = content_digest(absolute_path)?;
        self.hasher.update(mode.to_be_bytes());
        self.hasher.update(relative_path.as_bytes());
        self.hasher.update(digest);
        self.hasher.update([0u8]);
        Ok(())
    }

    pub fn feed_extra(&mut self, extra: &[u8]) {
        self.hasher.update(extra);
        self.hasher.update([0u8]);
    }

    pub fn feed_literal(&mut self, literal: &str) {
        self.hasher.update(literal.as_bytes());
    }

    pub fn finish(self) -> [u8; 20] {
        self.hasher.finalize().into()
    }
}

impl Default for SelfHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds the `self_hash` together with each dependency's `(name,
/// fingerprint)`, sorted by name, into the final `Fingerprint`.
pub fn full_hash(self_hash: [u8; 20], dependencies: &[(String, Fingerprint)]) -> Fingerprint {
    let mut deps = dependencies.to_vec();
    deps.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha1::new();
    hasher.update(self_hash);
    for (name, fingerprint) in deps {
        hasher.update(name.as_bytes());
        hasher.update(fingerprint.0);
        hasher.update([0u8]);
    }
    Fingerprint(hasher.finalize().into())
}

/// Sort and deduplicate a list of absolute input paths together with their
/// root-relative rendering, as required before feeding a `SelfHasher`.
pub fn sorted_relative(root: &Path, paths: impl IntoIterator<Item = PathBuf>) -> Vec<(PathBuf, String)> {
    let mut pairs: Vec<(PathBuf, String)> = paths
        .into_iter()
        .map(|p| {
            let rel = p
                .strip_prefix(root)
                .unwrap_or(&p)
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            (p, rel)
        })
        .collect();
    pairs.sort_by(|a, b| a.1.cmp(&b.1));
    pairs.dedup_by(|a, b| a.1 == b.1);
    pairs
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn hash_file(path: &Path, relative: &str) -> [u8; 20] {
        let mut hasher = SelfHasher::new();
        hasher.feed_input(path, relative).unwrap();
        hasher.finish()
    }

    #[test]
    fn same_content_same_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        assert_eq!(hash_file(&path, "a.txt"), hash_file(&path, "a.txt"));
    }

    #[test]
    fn content_change_changes_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");

        fs::write(&path, b"hello").unwrap();
        let before = hash_file(&path, "a.txt");

        fs::write(&path, b"hellp").unwrap();
        let after = hash_file(&path, "a.txt");

        assert_ne!(before, after);
    }

    #[test]
    fn mode_change_changes_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.sh");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        let before = hash_file(&path, "a.sh");

        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        let after = hash_file(&path, "a.sh");

        assert_ne!(before, after);
    }

    #[test]
    fn relative_path_change_changes_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        assert_ne!(hash_file(&path, "a.txt"), hash_file(&path, "b.txt"));
    }

    #[test]
    fn axis_literal_change_changes_self_hash() {
        let mut with_release = SelfHasher::new();
        with_release.feed_literal("arch=x86_64");
        with_release.feed_literal("coverage=false");
        with_release.feed_literal("sanitizer=none");

        let mut without_release = SelfHasher::new();
        without_release.feed_literal("arch=aarch64");
        without_release.feed_literal("coverage=false");
        without_release.feed_literal("sanitizer=none");

        assert_ne!(with_release.finish(), without_release.finish());
    }

    #[test]
    fn dependency_fingerprint_propagates() {
        let self_hash = [7u8; 20];
        let dep_a = Fingerprint([1u8; 20]);
        let dep_b = Fingerprint([2u8; 20]);

        let without_dep = full_hash(self_hash, &[("a".to_string(), dep_a)]);
        let with_changed_dep = full_hash(self_hash, &[("a".to_string(), dep_b)]);

        assert_ne!(without_dep.0, with_changed_dep.0);
    }

    #[test]
    fn dependency_order_does_not_affect_full_hash() {
        let self_hash = [7u8; 20];
        let a = ("a".to_string(), Fingerprint([1u8; 20]));
        let b = ("b".to_string(), Fingerprint([2u8; 20]));

        let forward = full_hash(self_hash, &[a.clone(), b.clone()]);
        let backward = full_hash(self_hash, &[b, a]);

        assert_eq!(forward.0, backward.0);
    }
}

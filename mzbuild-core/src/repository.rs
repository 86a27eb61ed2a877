//! Discovery: walk the source tree, parse every `mzbuild.yml` directory
//! into an `Image`, register every `mzcompose.yml` directory as a named
//! composition, and cross-validate the resulting set.

pub mod error;

use crate::image::{Image, COMPOSITION_FILE, MANIFEST_FILE};
use error::*;
use snafu::{ensure, ResultExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

pub struct Repository {
    pub root: PathBuf,
    pub images: HashMap<String, Image>,
    /// Directories containing a composition file, keyed by directory name.
    pub compositions: HashMap<String, PathBuf>,
}

impl Repository {
    /// Discover every image and composition under `root`, validating names
    /// and dependency edges before returning.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut images = HashMap::new();
        let mut compositions = HashMap::new();

        for dir in directories_with_manifest(&root) {
            let image = Image::load(&dir).context(ImageLoadSnafu { path: &dir })?;
            if let Some(existing) = images.insert(image.name.clone(), image) {
                return Err(Error::DuplicateName {
                    name: existing.name,
                });
            }
        }

        for dir in directories_with_composition(&root) {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if compositions.insert(name.clone(), dir).is_some() {
                return Err(Error::DuplicateComposition { name });
            }
        }

        let repo = Self {
            root,
            images,
            compositions,
        };
        repo.validate()?;
        Ok(repo)
    }

    fn validate(&self) -> Result<()> {
        for image in self.images.values() {
            for dep in &image.depends_on {
                ensure!(
                    self.images.contains_key(dep),
                    UnknownDependencySnafu {
                        image: image.name.clone(),
                        dep: dep.clone(),
                    }
                );
            }
        }
        Ok(())
    }

    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.get(name)
    }

    /// All mainline image names, used as the default target set when a
    /// caller names none explicitly.
    pub fn mainline_images(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .images
            .values()
            .filter(|i| i.mainline)
            .map(|i| i.name.clone())
            .collect();
        names.sort();
        names
    }
}

fn directories_with_manifest(root: &Path) -> Vec<PathBuf> {
    crate::vcs::walk_tracked_files(root)
        .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE))
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect()
}

fn directories_with_composition(root: &Path) -> Vec<PathBuf> {
    crate::vcs::walk_tracked_files(root)
        .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some(COMPOSITION_FILE))
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_image(root: &Path, name: &str, dockerfile: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("mzbuild.yml"), format!("name: {name}\n")).unwrap();
        fs::write(dir.join("Dockerfile"), dockerfile).unwrap();
    }

    #[test]
    fn discovers_and_links_images() {
        let tmp = TempDir::new().unwrap();
        write_image(tmp.path(), "parent", "MZFROM child\n");
        write_image(tmp.path(), "child", "FROM scratch\n");

        let repo = Repository::discover(tmp.path()).unwrap();
        assert_eq!(repo.images.len(), 2);
        assert_eq!(repo.image("parent").unwrap().depends_on, vec!["child"]);
    }

    #[test]
    fn rejects_unknown_dependency() {
        let tmp = TempDir::new().unwrap();
        write_image(tmp.path(), "parent", "MZFROM ghost\n");

        let err = Repository::discover(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_duplicate_names_across_directories() {
        let tmp = TempDir::new().unwrap();
        write_image(tmp.path(), "a", "FROM scratch\n");
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("b").join("mzbuild.yml"), "name: a\n").unwrap();
        fs::write(tmp.path().join("b").join("Dockerfile"), "FROM scratch\n").unwrap();

        let err = Repository::discover(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
    }

    #[test]
    fn registers_composition_by_parent_directory_name() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("demo");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("mzcompose.yml"), "services: {}\n").unwrap();

        let repo = Repository::discover(tmp.path()).unwrap();
        assert_eq!(repo.compositions.get("demo"), Some(&dir));
    }

    #[test]
    fn rejects_duplicate_composition_names() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a").join("demo");
        let b = tmp.path().join("b").join("demo");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("mzcompose.yml"), "services: {}\n").unwrap();
        fs::write(b.join("mzcompose.yml"), "services: {}\n").unwrap();

        let err = Repository::discover(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateComposition { .. }));
    }
}

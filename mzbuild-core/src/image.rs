//! An `Image`: one manifest plus container build file, with its
//! dependency edges and pre-image actions parsed but not yet resolved
//! against the rest of the repository.

pub mod error;

use crate::manifest::ImageManifest;
use crate::preimage::PreImage;
use error::*;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use snafu::ResultExt;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

pub const MANIFEST_FILE: &str = "mzbuild.yml";
pub const BUILD_FILE: &str = "Dockerfile";
/// Marks a directory as a composition; registered by name, not parsed.
pub const COMPOSITION_FILE: &str = "mzcompose.yml";

lazy_static! {
    /// Anchored at start-of-line only; a `MZFROM` appearing mid-line (e.g.
    /// quoted in a comment) is not a dependency edge. Shared with
    /// `resolved_image`, which uses the same pattern to rewrite matched
    /// lines to `FROM <spec>`.
    pub(crate) static ref MZFROM_RE: Regex = Regex::new(r"(?m)^MZFROM\s*(\S+)").unwrap();
}

#[derive(Debug, Clone)]
pub struct Image {
    pub name: String,
    pub path: PathBuf,
    pub publish: bool,
    pub mainline: bool,
    pub description: Option<String>,
    pub depends_on: Vec<String>,
    pub pre_images: Vec<PreImage>,
    pub build_args: HashMap<String, String>,
}

impl Image {
    /// Parse the manifest and build file at `dir` (a directory directly
    /// containing `mzbuild.yml` and `Dockerfile`).
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest =
            ImageManifest::load(&dir.join(MANIFEST_FILE)).context(ManifestSnafu)?;

        let build_file = dir.join(BUILD_FILE);
        let contents = fs::read(&build_file).context(BuildFileReadSnafu { path: &build_file })?;

        let mut depends_on: Vec<String> = MZFROM_RE
            .captures_iter(&contents)
            .filter_map(|cap| cap.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            .collect();
        depends_on.sort();
        depends_on.dedup();

        let pre_images = manifest
            .pre_image
            .into_iter()
            .map(PreImage::from_config)
            .collect::<Vec<_>>();

        Ok(Self {
            name: manifest.name,
            path: dir.to_path_buf(),
            publish: manifest.publish,
            mainline: manifest.mainline,
            description: manifest.description,
            depends_on,
            pre_images,
            build_args: manifest.build_args,
        })
    }

    pub fn build_file(&self) -> PathBuf {
        self.path.join(BUILD_FILE)
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_image(dir: &Path, manifest: &str, dockerfile: &str) {
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        fs::write(dir.join(BUILD_FILE), dockerfile).unwrap();
    }

    #[test]
    fn parses_mzfrom_dependencies() {
        let tmp = TempDir::new().unwrap();
        write_image(
            tmp.path(),
            "name: parent\n",
            "MZFROM child\nRUN echo hi\nMZFROM other-child\n",
        );
        let image = Image::load(tmp.path()).unwrap();
        assert_eq!(image.depends_on, vec!["child", "other-child"]);
    }

    #[test]
    fn ignores_mid_line_mzfrom() {
        let tmp = TempDir::new().unwrap();
        write_image(
            tmp.path(),
            "name: parent\n",
            "# see MZFROM child for an example\nFROM scratch\n",
        );
        let image = Image::load(tmp.path()).unwrap();
        assert!(image.depends_on.is_empty());
    }
}

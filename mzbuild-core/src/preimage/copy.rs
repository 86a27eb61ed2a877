//! The `copy` pre-image: glob-copy files from elsewhere in the workspace
//! into the image's build context before the container build runs.

use super::error::*;
use crate::vcs;
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub source: String,
    pub destination: String,
    pub matching: String,
}

#[derive(Debug, Clone)]
pub struct CopyAction {
    config: CopyConfig,
}

impl CopyAction {
    pub fn new(config: CopyConfig) -> Self {
        Self { config }
    }

    /// Files matched by `matching` under `repo_root/source`.
    pub fn inputs(&self, repo_root: &Path) -> super::Result<Vec<PathBuf>> {
        let source_dir = repo_root.join(&self.config.source);
        vcs::expand_glob(&source_dir, &self.config.matching).context(GlobExpandSnafu {
            dir: &source_dir,
            pattern: self.config.matching.clone(),
        })
    }

    /// `source|destination|matching`: unlike the input file set, this makes
    /// a destination-only change fingerprint-visible even when the matched
    /// files are identical.
    pub fn extra(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}",
            self.config.source, self.config.destination, self.config.matching
        )
        .into_bytes()
    }

    pub fn run(&self, repo_root: &Path, image_dir: &Path) -> super::Result<()> {
        let source_dir = repo_root.join(&self.config.source);
        let destination_dir = image_dir.join(&self.config.destination);
        for input in self.inputs(repo_root)? {
            let relative = input.strip_prefix(&source_dir).unwrap_or(&input);
            let target = destination_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
            }
            fs::copy(&input, &target).context(CopySnafu {
                from: input.clone(),
                to: target,
            })?;
        }
        Ok(())
    }
}

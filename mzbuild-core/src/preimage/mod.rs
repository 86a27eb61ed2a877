//! Pre-image actions: work performed in the host workspace before the
//! container build starts, producing files the container build will read.
//!
//! There are exactly two variants, matching the two the orchestrator
//! supports: [`copy::CopyAction`] and [`native_build::NativeBuildAction`].
//! Batching (preparing all instances of one variant together) is scoped
//! per variant, dispatched by [`PreImageBatch`].

pub mod copy;
pub mod error;
pub mod native_build;

pub use copy::{CopyAction, CopyConfig};
pub use native_build::{NativeBuildAction, NativeBuildConfig};

use crate::axes::BuildAxes;
use crate::toolchain::Toolchain;
use crate::workspace::WorkspaceGraph;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, error::Error>;

/// The parsed, not-yet-instantiated form of a pre-image entry, as it comes
/// out of the manifest.
#[derive(Debug, Clone)]
pub enum PreImageConfig {
    Copy(CopyConfig),
    CargoBuild(NativeBuildConfig),
}

/// One configured pre-image action, ready to compute inputs or run.
#[derive(Debug, Clone)]
pub enum PreImage {
    Copy(CopyAction),
    NativeBuild(NativeBuildAction),
}

impl PreImage {
    pub fn from_config(config: PreImageConfig) -> Self {
        match config {
            PreImageConfig::Copy(c) => PreImage::Copy(CopyAction::new(c)),
            PreImageConfig::CargoBuild(c) => PreImage::NativeBuild(NativeBuildAction::new(c)),
        }
    }

    pub fn inputs(
        &self,
        repo_root: &Path,
        workspace: &WorkspaceGraph,
    ) -> Result<Vec<PathBuf>> {
        match self {
            PreImage::Copy(a) => a.inputs(repo_root),
            PreImage::NativeBuild(a) => a.inputs(repo_root, workspace),
        }
    }

    pub fn extra(&self, axes: &BuildAxes) -> Vec<u8> {
        match self {
            PreImage::Copy(a) => a.extra(),
            PreImage::NativeBuild(a) => a.extra(axes),
        }
    }
}

/// Computed once per wave for every `NativeBuild` pre-image scheduled in
/// it; `Copy` needs no batch preparation, so this only ever holds compile
/// output.
#[derive(Debug, Clone, Default)]
pub struct PreImageBatch {
    pub native_build: native_build::BuildMessages,
}

/// Group the given pre-images by variant and prepare each variant exactly
/// once, regardless of how many images share it.
pub fn prepare_batch(
    pre_images: &[&PreImage],
    repo_root: &Path,
    axes: &BuildAxes,
    toolchain: &Toolchain,
    workspace: &WorkspaceGraph,
) -> Result<PreImageBatch> {
    let native_builds: Vec<&NativeBuildAction> = pre_images
        .iter()
        .filter_map(|p| match p {
            PreImage::NativeBuild(a) => Some(a),
            PreImage::Copy(_) => None,
        })
        .collect();

    let native_build = if native_builds.is_empty() {
        native_build::BuildMessages::default()
    } else {
        native_build::prepare_batch(&native_builds, repo_root, axes, toolchain, workspace)?
    };

    Ok(PreImageBatch { native_build })
}

/// Run one pre-image action given the batch it belongs to.
pub fn run(
    pre_image: &PreImage,
    prep: &PreImageBatch,
    repo_root: &Path,
    axes: &BuildAxes,
    toolchain: &Toolchain,
    image_dir: &Path,
) -> Result<()> {
    match pre_image {
        PreImage::Copy(a) => a.run(repo_root, image_dir),
        PreImage::NativeBuild(a) => {
            native_build::run(a, &prep.native_build, repo_root, axes, toolchain, image_dir)
        }
    }
}

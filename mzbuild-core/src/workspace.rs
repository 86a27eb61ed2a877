//! The "workspace probe": maps a binary or example name to its owning
//! Cargo package and walks the transitive closure of first-party
//! (intra-workspace, path-based) dependencies.
//!
//! Backed by `guppy`'s package graph, queried the same way a package's
//! direct and transitive workspace dependencies are usually resolved:
//! `cargo metadata` for the graph, `query_forward` for the closure.

use guppy::graph::{DependencyDirection, PackageGraph, PackageLink, PackageMetadata};
use guppy::{CargoMetadata, MetadataCommand};
use std::path::{Path, PathBuf};

pub mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub enum Error {
        #[snafu(display("failed to run `cargo metadata` in '{}': {source}", dir.display()))]
        MetadataSpawn {
            dir: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("failed to parse `cargo metadata` output from '{}': {source}", dir.display()))]
        MetadataParse {
            dir: PathBuf,
            source: guppy::Error,
        },

        #[snafu(display("failed to build package graph: {source}"))]
        GraphBuild { source: guppy::Error },

        #[snafu(display("binary or example '{target}' was not found in the workspace"))]
        TargetNotFound { target: String },

        #[snafu(display("package graph query from '{name}' failed: {source}"))]
        Query { name: String, source: guppy::Error },
    }
}

use error::*;
type Result<T> = std::result::Result<T, Error>;

/// The kind of Cargo target being resolved; determines whether
/// dev-dependency edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Bin,
    Example,
}

pub struct WorkspaceGraph {
    graph: PackageGraph,
}

impl WorkspaceGraph {
    /// Run `cargo metadata` rooted at `workspace_root` and build the graph:
    /// shell out for the JSON, then let `guppy` parse it.
    pub fn discover(workspace_root: &Path) -> Result<Self> {
        let output = MetadataCommand::new()
            .current_dir(workspace_root)
            .other_options(["--locked".to_string()])
            .cargo_command()
            .output()
            .map_err(|source| Error::MetadataSpawn {
                dir: workspace_root.to_path_buf(),
                source,
            })?;
        let json = String::from_utf8_lossy(&output.stdout).into_owned();
        let graph = CargoMetadata::parse_json(json)
            .map_err(|source| Error::MetadataParse {
                dir: workspace_root.to_path_buf(),
                source,
            })?
            .build_graph()
            .context_graph_build()?;
        Ok(Self { graph })
    }

    /// Find the package that declares a `[[bin]]`/`[[example]]` target with
    /// this name, considering only workspace members.
    fn find_owning_package(&self, target_name: &str, kind: TargetKind) -> Result<PackageMetadata<'_>> {
        for package in self.graph.workspace().iter() {
            let has_target = package.build_targets().any(|t| {
                let matches_name = t.name() == target_name;
                let matches_kind = match kind {
                    TargetKind::Bin => {
                        matches!(t.id(), guppy::graph::BuildTargetId::Binary(_))
                    }
                    TargetKind::Example => {
                        matches!(t.id(), guppy::graph::BuildTargetId::Example(_))
                    }
                };
                matches_name && matches_kind
            });
            if has_target {
                return Ok(package);
            }
        }
        Err(Error::TargetNotFound {
            target: target_name.to_string(),
        })
    }

    /// The transitive first-party (path-dependency) closure of the package
    /// owning `target_name`, following dev-dependency edges too when
    /// resolving an example (examples may pull in test-only workspace
    /// helpers that binaries never see).
    pub fn transitive_path_packages(
        &self,
        target_name: &str,
        kind: TargetKind,
    ) -> Result<Vec<PathBuf>> {
        let owner = self.find_owning_package(target_name, kind)?;
        let ids = [owner.id()];
        let query = self
            .graph
            .query_forward(ids)
            .map_err(|source| Error::Query {
                name: target_name.to_string(),
                source,
            })?;
        let follow_dev = kind == TargetKind::Example;
        let package_set = query.resolve_with_fn(|_, link: PackageLink<'_>| {
            let is_normal_or_build = link.normal().is_present() || link.build().is_present();
            is_first_party(&link) && (is_normal_or_build || (follow_dev && link.dev().is_present()))
        });

        let mut dirs: Vec<PathBuf> = package_set
            .packages(DependencyDirection::Forward)
            .filter_map(|pkg| pkg.manifest_path().parent().map(|p| p.to_path_buf()))
            .collect();
        dirs.sort();
        dirs.dedup();
        Ok(dirs)
    }

    pub fn owning_package_name(&self, target_name: &str, kind: TargetKind) -> Result<String> {
        Ok(self.find_owning_package(target_name, kind)?.name().to_string())
    }
}

/// Only follow edges within the workspace: a path dependency is first
/// party; a registry/git dependency is not and its contents are assumed
/// fixed by the lockfile (already tracked via `Cargo.lock`).
fn is_first_party(link: &PackageLink<'_>) -> bool {
    link.to().source().is_local()
}

trait GuppyErrorContext<T> {
    fn context_graph_build(self) -> Result<T>;
}

impl<T> GuppyErrorContext<T> for std::result::Result<T, guppy::Error> {
    fn context_graph_build(self) -> Result<T> {
        self.map_err(|source| Error::GraphBuild { source })
    }
}

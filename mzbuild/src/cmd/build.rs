use crate::cmd::{ci_retry_budget, CommonArgs};
use anyhow::Result;
use clap::Parser;
use mzbuild_core::{Builder, DependencySet, Repository, Toolchain, WorkspaceGraph};
use std::process::ExitCode;

/// Discover the repository, resolve the named targets (or every mainline
/// image), and pull or build each in topological order.
#[derive(Debug, Parser)]
pub(crate) struct Build {
    #[clap(flatten)]
    common: CommonArgs,
}

impl Build {
    pub(crate) fn run(&self) -> Result<ExitCode> {
        let repo = Repository::discover(self.common.root.as_path())?;
        let targets = self.common.targets(&repo);
        let axes = self.common.build_axes();
        let toolchain = Toolchain::new(self.common.workspace_root(), axes.arch);
        let workspace = WorkspaceGraph::discover(&self.common.workspace_root())?;

        let builder = Builder::new();
        let deps = DependencySet::new(&repo, &targets, axes, toolchain, workspace, &builder)?;
        deps.acquire(&builder, ci_retry_budget())?;

        for name in deps.order() {
            log::info!("acquired {name}");
        }
        Ok(ExitCode::SUCCESS)
    }
}

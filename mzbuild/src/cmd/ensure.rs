use crate::cmd::CommonArgs;
use anyhow::Result;
use clap::Parser;
use mzbuild_core::{Builder, DependencySet, Repository, Toolchain, WorkspaceGraph};
use std::process::ExitCode;

/// Like `build`, but runs `ensure`: build whatever isn't already published,
/// then push everything newly built that's publishable.
#[derive(Debug, Parser)]
pub(crate) struct Ensure {
    #[clap(flatten)]
    common: CommonArgs,
}

impl Ensure {
    pub(crate) fn run(&self) -> Result<ExitCode> {
        let repo = Repository::discover(self.common.root.as_path())?;
        let targets = self.common.targets(&repo);
        let axes = self.common.build_axes();
        let toolchain = Toolchain::new(self.common.workspace_root(), axes.arch);
        let workspace = WorkspaceGraph::discover(&self.common.workspace_root())?;

        let builder = Builder::new();
        let deps = DependencySet::new(&repo, &targets, axes, toolchain, workspace, &builder)?;
        deps.ensure(&builder, |name| log::info!("built {name}"))?;
        Ok(ExitCode::SUCCESS)
    }
}

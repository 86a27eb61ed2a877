use crate::cmd::CommonArgs;
use anyhow::Result;
use clap::Parser;
use mzbuild_core::{Builder, DependencySet, Repository, Toolchain, WorkspaceGraph};
use std::process::ExitCode;

/// Resolve the named targets and report, without pulling or building
/// anything, whether every publishable one is already published.
#[derive(Debug, Parser)]
pub(crate) struct Check {
    #[clap(flatten)]
    common: CommonArgs,
}

impl Check {
    pub(crate) fn run(&self) -> Result<ExitCode> {
        let repo = Repository::discover(self.common.root.as_path())?;
        let targets = self.common.targets(&repo);
        let axes = self.common.build_axes();
        let toolchain = Toolchain::new(self.common.workspace_root(), axes.arch);
        let workspace = WorkspaceGraph::discover(&self.common.workspace_root())?;

        let builder = Builder::new();
        let deps = DependencySet::new(&repo, &targets, axes, toolchain, workspace, &builder)?;
        let published = deps.check(&builder)?;

        if published {
            println!("all named images are published");
            Ok(ExitCode::SUCCESS)
        } else {
            println!("one or more named images are not yet published");
            Ok(ExitCode::FAILURE)
        }
    }
}

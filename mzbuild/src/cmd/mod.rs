mod build;
mod check;
mod ensure;
mod list;

use crate::cmd::build::Build;
use crate::cmd::check::Check;
use crate::cmd::ensure::Ensure;
use crate::cmd::list::List;
use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;
use mzbuild_core::{Arch, BuildAxes, Sanitizer};
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Content-addressed build orchestration for container images.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
pub(crate) struct Args {
    /// Set the logging level. One of [off|error|warn|info|debug|trace]. Defaults to info. You
    /// can also leave this unset and use the RUST_LOG env variable.
    #[clap(long = "log-level")]
    pub(crate) log_level: Option<LevelFilter>,

    #[clap(subcommand)]
    pub(crate) subcommand: Subcmd,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Subcmd {
    /// List every discovered image and whether it's publishable.
    List(List),
    /// Pull or build the named images (or all mainline images).
    Build(Build),
    /// Build and push whatever isn't already published.
    Ensure(Ensure),
    /// Exit nonzero if any named image isn't already published.
    Check(Check),
}

pub(crate) fn run(args: Args) -> Result<ExitCode> {
    match args.subcommand {
        Subcmd::List(cmd) => cmd.run(),
        Subcmd::Build(cmd) => cmd.run(),
        Subcmd::Ensure(cmd) => cmd.run(),
        Subcmd::Check(cmd) => cmd.run(),
    }
}

pub(crate) fn init_logger(level: Option<LevelFilter>) {
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            Builder::from_default_env().init();
        }
        _ => {
            Builder::new()
                .filter(
                    Some(env!("CARGO_CRATE_NAME")),
                    level.unwrap_or(DEFAULT_LEVEL_FILTER),
                )
                .init();
        }
    }
}

/// Flags mirroring `BuildAxes` 1:1, shared by every subcommand that needs
/// to resolve images against a repository.
#[derive(Debug, Parser)]
pub(crate) struct CommonArgs {
    /// Root of the repository to discover images under. Defaults to the
    /// current directory.
    #[clap(long, default_value = ".")]
    pub(crate) root: PathBuf,

    /// Root of the Cargo workspace backing `cargo-build` pre-images, if it
    /// differs from `--root`.
    #[clap(long)]
    pub(crate) workspace_root: Option<PathBuf>,

    #[clap(long, default_value = "x86_64")]
    pub(crate) arch: Arch,

    #[clap(long, conflicts_with = "dev")]
    pub(crate) release: bool,

    #[clap(long, conflicts_with = "release")]
    pub(crate) dev: bool,

    #[clap(long, env = "CI_COVERAGE_ENABLED")]
    pub(crate) coverage: bool,

    #[clap(long, env = "CI_SANITIZER", default_value = "none")]
    pub(crate) sanitizer: Sanitizer,

    #[clap(long, default_value = "public.ecr.aws/my-org")]
    pub(crate) image_registry: String,

    #[clap(long, default_value = "")]
    pub(crate) image_prefix: String,

    /// Names of the images to operate on. Defaults to every mainline image.
    pub(crate) images: Vec<String>,
}

impl CommonArgs {
    pub(crate) fn build_axes(&self) -> BuildAxes {
        BuildAxes {
            root: self.workspace_root.clone().unwrap_or_else(|| self.root.clone()),
            arch: self.arch,
            release_mode: self.release,
            coverage: self.coverage,
            sanitizer: self.sanitizer,
            registry: self.image_registry.clone(),
            prefix: self.image_prefix.clone(),
        }
    }

    pub(crate) fn workspace_root(&self) -> PathBuf {
        self.workspace_root.clone().unwrap_or_else(|| self.root.clone())
    }

    /// The explicitly named images, or every mainline image if none were
    /// named.
    pub(crate) fn targets(&self, repo: &mzbuild_core::Repository) -> Vec<String> {
        if self.images.is_empty() {
            repo.mainline_images()
        } else {
            self.images.clone()
        }
    }
}

/// `CI` enables retry-on-transient-failure for registry pulls; any other
/// value (including unset) disables it.
pub(crate) fn ci_retry_budget() -> mzbuild_core::RetryBudget {
    let ci = std::env::var("CI").map(|v| v == "true" || v == "1").unwrap_or(false);
    if ci {
        mzbuild_core::RetryBudget(Some(std::time::Duration::from_secs(300)))
    } else {
        mzbuild_core::RetryBudget(None)
    }
}

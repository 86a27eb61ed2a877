use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{source}"))]
    PreImage {
        source: crate::preimage::error::Error,
    },

    #[snafu(display("{source}"))]
    Build { source: crate::builder::error::Error },

    #[snafu(display("failed to read input '{}': {source}", path.display()))]
    InputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read build file '{}': {source}", path.display()))]
    BuildFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to purge untracked output under '{}': {source}", path.display()))]
    Purge {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "mzbuild.yml for '{name}' exists but no files are tracked under it; this is a data integrity bug"
    ))]
    NoTrackedFiles { name: String },

    #[snafu(display("Dockerfile references MZFROM {name}, which is not a resolved dependency"))]
    UnresolvedDependency { name: String },
}

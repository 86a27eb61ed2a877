use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to expand glob '{pattern}' under '{}': {source}", dir.display()))]
    GlobExpand {
        dir: PathBuf,
        pattern: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to copy '{}' to '{}': {source}", from.display(), to.display()))]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to create directory '{}': {source}", path.display()))]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[snafu(display("workspace probe failed: {source}"))]
    Workspace { source: crate::workspace::error::Error },

    #[snafu(display("cargo build invocation failed: {source}"))]
    CargoInvocation { source: std::io::Error },

    #[snafu(display("cargo build exited with status {status}"))]
    CargoBuildFailed { status: i32 },

    #[snafu(display("failed to parse cargo build-message line: {source}"))]
    BuildMessageParse { source: serde_json::Error },

    #[snafu(display("malformed package_id '{package_id}' in cargo build message"))]
    MalformedPackageId { package_id: String },

    #[snafu(display("failed to post-process binary '{}': {source}", path.display()))]
    PostProcess { path: PathBuf, source: std::io::Error },
}

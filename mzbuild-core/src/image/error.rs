use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{source}"))]
    Manifest {
        source: crate::manifest::error::Error,
    },

    #[snafu(display("failed to read build file '{}': {source}", path.display()))]
    BuildFileRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

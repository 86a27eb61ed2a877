use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to read manifest '{}': {source}", path.display()))]
    ManifestRead { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse manifest '{}': {source}", path.display()))]
    ManifestParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[snafu(display("invalid image name '{name}' in '{}': must match ^[A-Za-z0-9-]+$", path.display()))]
    InvalidName { path: PathBuf, name: String },

    #[snafu(display(
        "cargo-build pre-image for '{name}' in '{}' declares neither bin nor example",
        path.display()
    ))]
    EmptyCargoBuild { path: PathBuf, name: String },
}

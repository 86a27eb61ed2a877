use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to load image at '{}': {source}", path.display()))]
    ImageLoad {
        path: PathBuf,
        source: crate::image::error::Error,
    },

    #[snafu(display("duplicate image name '{name}'"))]
    DuplicateName { name: String },

    #[snafu(display("duplicate composition '{name}'"))]
    DuplicateComposition { name: String },

    #[snafu(display("image '{image}' depends on unknown image '{dep}'"))]
    UnknownDependency { image: String, dep: String },
}

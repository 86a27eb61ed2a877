use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{source}"))]
    Resolver {
        source: crate::resolver::error::Error,
    },

    #[snafu(display("{source}"))]
    PreImage {
        source: crate::preimage::error::Error,
    },

    #[snafu(display("{source}"))]
    ResolvedImage {
        source: crate::resolved_image::error::Error,
    },

    #[snafu(display("{source}"))]
    Builder { source: crate::builder::error::Error },
}

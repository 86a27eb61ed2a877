use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "circular dependency in mzbuild: {}",
        path.join(" -> ")
    ))]
    CircularDependency { path: Vec<String> },

    #[snafu(display("unknown dependency '{name}'"))]
    UnknownTarget { name: String },
}

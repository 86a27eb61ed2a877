use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to start '{command}': {source}"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("'{command}' exited with status {exit_code}"))]
    Subprocess { command: String, exit_code: i32 },
}

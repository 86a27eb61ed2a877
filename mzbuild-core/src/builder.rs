//! The only place `mzbuild-core` shells out to the external container
//! engine: build, pull, push, and remote-manifest-exists checks, with
//! bounded retry on transient failures.
//!
//! Every invocation is a blocking `duct` call, in keeping with this
//! orchestrator's single-threaded, externally-concurrent model: the
//! container engine (and everything it shells out to in turn) does the
//! actual concurrent work, not this process.

pub mod error;

use error::*;
use lazy_static::lazy_static;
use regex::Regex;
use snafu::{ensure, ResultExt};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

pub type Result<T> = std::result::Result<T, Error>;

lazy_static! {
    /// Signatures of known-transient registry pull failures, worth a retry
    /// rather than an immediate hard failure.
    static ref TRANSIENT_PULL_ERRORS: Vec<Regex> = vec![
        Regex::new(r"(?i)TLS handshake timeout").unwrap(),
        Regex::new(r"(?i)connection reset by peer").unwrap(),
        Regex::new(r"(?i)i/o timeout").unwrap(),
        Regex::new(r"(?i)500 Internal Server Error").unwrap(),
        Regex::new(r"(?m)unexpected EOF$").unwrap(),
    ];
}

/// How long to keep retrying a transient pull failure before giving up.
/// `None` disables retry entirely (a single attempt).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryBudget(pub Option<Duration>);

pub struct Builder {
    engine: String,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            engine: "docker".to_string(),
        }
    }

    /// Invoke the external builder with `dockerfile_bytes` piped to stdin
    /// (the container build file as rewritten by `ResolvedImage`), tagging
    /// the result `tag`.
    pub fn build(
        &self,
        dockerfile_bytes: &[u8],
        context_dir: &Path,
        build_args: &HashMap<String, String>,
        platform: &str,
        tag: &str,
    ) -> Result<()> {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            "-".to_string(),
            format!("--platform={}", platform),
            "-t".to_string(),
            tag.to_string(),
        ];
        for (key, value) in build_args {
            args.push(format!("--build-arg={}={}", key, value));
        }
        args.push(context_dir.to_string_lossy().into_owned());

        let output = duct::cmd(&self.engine, &args)
            .dir(context_dir)
            .stdin_bytes(dockerfile_bytes.to_vec())
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: format!("{} {}", self.engine, args.join(" ")),
            })?;

        print!("{}", String::from_utf8_lossy(&output.stdout));
        ensure!(
            output.status.success(),
            SubprocessSnafu {
                command: format!("{} build", self.engine),
                exit_code: output.status.code().unwrap_or(-1),
            }
        );
        Ok(())
    }

    /// Attempt to pull `spec` from the registry, retrying on a known
    /// transient failure signature until `budget` is exhausted.
    pub fn pull(&self, spec: &str, budget: RetryBudget) -> Result<()> {
        let deadline = budget.0.map(|d| Instant::now() + d);

        loop {
            let output = duct::cmd(&self.engine, ["pull", spec])
                .stderr_to_stdout()
                .stdout_capture()
                .unchecked()
                .run()
                .context(SpawnSnafu {
                    command: format!("{} pull {}", self.engine, spec),
                })?;

            if output.status.success() {
                return Ok(());
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            let transient = TRANSIENT_PULL_ERRORS.iter().any(|re| re.is_match(&stdout));
            let retryable = transient && deadline.map(|d| Instant::now() < d).unwrap_or(false);

            if !retryable {
                return Err(Error::Subprocess {
                    command: format!("{} pull {}", self.engine, spec),
                    exit_code: output.status.code().unwrap_or(-1),
                });
            }
        }
    }

    pub fn push(&self, spec: &str) -> Result<()> {
        let output = duct::cmd(&self.engine, ["push", spec])
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: format!("{} push {}", self.engine, spec),
            })?;
        ensure!(
            output.status.success(),
            SubprocessSnafu {
                command: format!("{} push {}", self.engine, spec),
                exit_code: output.status.code().unwrap_or(-1),
            }
        );
        Ok(())
    }

    /// Every `repository:tag` spec present in the local image store, used
    /// to seed `acquired` status from prior runs without attempting a pull.
    pub fn local_specs(&self) -> Result<HashSet<String>> {
        let output = duct::cmd(&self.engine, ["images", "--format", "{{.Repository}}:{{.Tag}}"])
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: format!("{} images", self.engine),
            })?;
        ensure!(
            output.status.success(),
            SubprocessSnafu {
                command: format!("{} images", self.engine),
                exit_code: output.status.code().unwrap_or(-1),
            }
        );
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// A nonzero exit from `manifest inspect` means "not found", not a
    /// hard failure: existence checks are never fatal on their own.
    pub fn manifest_exists(&self, spec: &str) -> bool {
        duct::cmd(&self.engine, ["manifest", "inspect", spec])
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch `docker push <spec>` for every spec in `specs`, running them
/// concurrently as separate subprocesses (the orchestrator itself remains
/// single-threaded; the OS schedules the child processes), waiting for
/// all of them, and surfacing the first nonzero exit.
pub fn push_all(engine: &Builder, specs: &[String]) -> Result<()> {
    let handles: Vec<(String, duct::Handle)> = specs
        .iter()
        .map(|spec| {
            let expr = duct::cmd(&engine.engine, ["push", spec.as_str()])
                .stderr_to_stdout()
                .stdout_capture()
                .unchecked();
            expr.start()
                .context(SpawnSnafu {
                    command: format!("{} push {}", engine.engine, spec),
                })
                .map(|handle| (spec.clone(), handle))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut first_failure = None;
    for (spec, handle) in handles {
        let output = handle.wait().context(SpawnSnafu {
            command: format!("{} push {}", engine.engine, spec),
        })?;
        if !output.status.success() && first_failure.is_none() {
            first_failure = Some(Error::Subprocess {
                command: format!("{} push {}", engine.engine, spec),
                exit_code: output.status.code().unwrap_or(-1),
            });
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

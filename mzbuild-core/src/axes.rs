//! The build axes that partition the fingerprint cache: target architecture,
//! release/coverage/sanitizer flags, and the registry an image publishes to.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sanitizer instrumentation requested for a build, if any.
///
/// Mirrors the axis the Python original exposes via `CI_SANITIZER`; kept as
/// its own enum (rather than `Option<String>`) so invalid values are
/// rejected at the CLI boundary instead of silently producing an
/// unrecognized flag string deep inside a cargo invocation.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sanitizer {
    #[default]
    None,
    Address,
    Hwaddress,
    Cfi,
    Thread,
    Leak,
    Memory,
}

serde_plain::derive_fromstr_from_deserialize!(Sanitizer);
serde_plain::derive_display_from_serialize!(Sanitizer);

impl Sanitizer {
    pub fn is_none(&self) -> bool {
        matches!(self, Sanitizer::None)
    }

    /// The lowercase axis tag used in `extra()` and in toolchain flag
    /// synthesis, e.g. `"address"`.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Sanitizer::None => None,
            Sanitizer::Address => Some("address"),
            Sanitizer::Hwaddress => Some("hwaddress"),
            Sanitizer::Cfi => Some("cfi"),
            Sanitizer::Thread => Some("thread"),
            Sanitizer::Leak => Some("leak"),
            Sanitizer::Memory => Some("memory"),
        }
    }
}

/// Target architecture an image is built for.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
}

serde_plain::derive_fromstr_from_deserialize!(Arch);
serde_plain::derive_display_from_serialize!(Arch);

impl Arch {
    /// Docker/OCI platform architecture name, e.g. for `--platform=linux/<goarch>`.
    pub fn goarch(&self) -> &'static str {
        match self {
            Arch::X86_64 => "amd64",
            Arch::Aarch64 => "arm64",
        }
    }

    /// GCC-style target triple prefix used when injecting cross toolchain
    /// build args into the container build (`ARCH_GCC`).
    pub fn gcc_triple(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64-unknown-linux-gnu",
            Arch::Aarch64 => "aarch64-unknown-linux-gnu",
        }
    }
}

/// Immutable build-axis configuration for a single orchestrator run.
///
/// Every `ResolvedImage::fingerprint()` in the run is computed under the
/// same axes; two runs with different axes occupy disjoint cache space.
#[derive(Debug, Clone)]
pub struct BuildAxes {
    pub root: PathBuf,
    pub arch: Arch,
    pub release_mode: bool,
    pub coverage: bool,
    pub sanitizer: Sanitizer,
    pub registry: String,
    pub prefix: String,
}

impl BuildAxes {
    /// The `arch=`/`coverage=`/`sanitizer=` literal strings fed into the
    /// self-hash, in the fixed order the fingerprint algorithm requires.
    pub fn fingerprint_literals(&self) -> [String; 3] {
        [
            format!("arch={}", self.arch),
            format!("coverage={}", self.coverage),
            format!("sanitizer={}", self.sanitizer),
        ]
    }

    /// Sorted, comma-joined axis tags present for this run: used by
    /// `CargoBuild::extra()`. Order is lexicographic so equivalent
    /// configurations hash identically regardless of how axes were set.
    pub fn active_tags(&self) -> String {
        let mut tags = Vec::new();
        if self.release_mode {
            tags.push("release");
        }
        if self.coverage {
            tags.push("coverage");
        }
        if let Some(tag) = self.sanitizer.tag() {
            tags.push(tag);
        }
        tags.sort_unstable();
        tags.join(",")
    }

    pub fn cargo_target_dir(&self) -> PathBuf {
        self.root.join("target-xcompile")
    }
}

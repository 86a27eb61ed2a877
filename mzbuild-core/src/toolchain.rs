//! Cross-compilation toolchain layout: where the target's `cc`/`strip`/
//! `objcopy` live, and the builder-container-to-host path rewrite needed to
//! make build-script output directories usable after the batched compile.

use crate::axes::Arch;
use std::path::{Path, PathBuf};

/// The path prefix a build-script `out_dir` is reported under when the
/// compile runs inside the builder container.
const BUILDER_TARGET_PREFIX: &str = "/mnt/build";

pub struct Toolchain {
    root: PathBuf,
    arch: Arch,
}

impl Toolchain {
    pub fn new(root: impl Into<PathBuf>, arch: Arch) -> Self {
        Self {
            root: root.into(),
            arch,
        }
    }

    pub fn target_triple(&self) -> &'static str {
        self.arch.gcc_triple()
    }

    fn sdk_root(&self) -> PathBuf {
        self.root.join("sdk").join(self.target_triple())
    }

    pub fn sysroot(&self) -> PathBuf {
        self.sdk_root().join("sys-root")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.sdk_root().join("bin")
    }

    /// Path to a cross toolchain binary, e.g. `tool("gcc")`,
    /// `tool("strip")`, `tool("objcopy")`.
    pub fn tool(&self, name: &str) -> PathBuf {
        self.bin_dir()
            .join(format!("{}-{}", self.target_triple(), name))
    }

    pub fn cc(&self) -> PathBuf {
        self.tool("gcc")
    }

    pub fn cxx(&self) -> PathBuf {
        self.tool("g++")
    }

    pub fn strip(&self) -> PathBuf {
        self.tool("strip")
    }

    pub fn objcopy(&self) -> PathBuf {
        self.tool("objcopy")
    }

    /// Directory containing shim binaries that should take priority on
    /// `PATH` for sanitizer-instrumented builds (e.g. a shim `ld` that
    /// selects the right runtime).
    pub fn sanitizer_shim_dir(&self) -> PathBuf {
        self.root.join("sanitizer-shims").join(self.target_triple())
    }

    /// Rewrite a path reported by a build running inside the builder
    /// container (prefixed with `/mnt/build/<triple>`) to its host
    /// equivalent under `target-xcompile`. Paths outside that prefix are
    /// returned unchanged: they belong to a host-side build script, not a
    /// cross-compiled one, and must not be rewritten.
    pub fn rewrite_builder_path_for_host(&self, root: &Path, builder_path: &str) -> PathBuf {
        let prefix = format!("{}/{}", BUILDER_TARGET_PREFIX, self.target_triple());
        match builder_path.strip_prefix(&prefix) {
            Some(rest) => root
                .join("target-xcompile")
                .join(self.target_triple())
                .join(rest.trim_start_matches('/')),
            None => PathBuf::from(builder_path),
        }
    }
}

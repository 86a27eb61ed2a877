//! The `cargo-build` pre-image: batches native compilation across every
//! image scheduled in a wave that needs it, so the expensive compile step
//! runs exactly once no matter how many images share the toolchain
//! invocation.

use super::error::*;
use crate::axes::BuildAxes;
use crate::toolchain::Toolchain;
use crate::workspace::{TargetKind, WorkspaceGraph};
use serde::Deserialize;
use snafu::{ensure, ResultExt};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct NativeBuildConfig {
    pub bins: Vec<String>,
    pub examples: Vec<String>,
    pub strip: bool,
    /// package name -> (src relative to its build-script out_dir -> dst
    /// relative to the image directory)
    pub extract: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct NativeBuildAction {
    config: NativeBuildConfig,
}

impl NativeBuildAction {
    pub fn new(config: NativeBuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NativeBuildConfig {
        &self.config
    }

    /// The fixed toolchain inputs, plus the transitive first-party closure
    /// of every declared binary and example.
    pub fn inputs(
        &self,
        repo_root: &Path,
        workspace: &WorkspaceGraph,
    ) -> super::Result<Vec<PathBuf>> {
        let mut paths = vec![
            repo_root.join("Cargo.toml"),
            repo_root.join("Cargo.lock"),
            repo_root.join(".cargo").join("config.toml"),
            repo_root.join("ci").join("builder"),
        ];

        for bin in &self.config.bins {
            let dirs = workspace
                .transitive_path_packages(bin, TargetKind::Bin)
                .context(WorkspaceSnafu)?;
            for dir in dirs {
                paths.extend(crate::vcs::walk_tracked_files(&dir));
            }
        }
        for example in &self.config.examples {
            let dirs = workspace
                .transitive_path_packages(example, TargetKind::Example)
                .context(WorkspaceSnafu)?;
            for dir in dirs {
                paths.extend(crate::vcs::walk_tracked_files(&dir));
            }
        }
        paths.retain(|p| p.exists());
        Ok(paths)
    }

    /// Sorted, comma-joined active axis tags: two `cargo-build` pre-images
    /// under the same axes hash identically regardless of which bins or
    /// examples they declare (those are already covered by `inputs()`).
    pub fn extra(&self, axes: &BuildAxes) -> Vec<u8> {
        axes.active_tags().into_bytes()
    }
}

/// One `build-script-executed` message, rewritten to a host path.
#[derive(Debug, Clone)]
pub struct BuildScriptOutput {
    pub package_name: String,
    pub out_dir: PathBuf,
}

/// The result of one batched compile: captured build-script output
/// directories, keyed loosely (lookup is linear; batches are small).
#[derive(Debug, Clone, Default)]
pub struct BuildMessages {
    pub outputs: Vec<BuildScriptOutput>,
}

impl BuildMessages {
    pub fn out_dir_for(&self, package_name: &str) -> Option<&Path> {
        self.outputs
            .iter()
            .find(|o| o.package_name == package_name)
            .map(|o| o.out_dir.as_path())
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    reason: String,
    #[serde(default)]
    package_id: String,
    #[serde(default)]
    out_dir: Option<String>,
}

/// Parse a `package_id` from either cargo form:
/// `registry+https://...#name@1.2.3` / `path+file:///p#name@0.1.0`, or the
/// older `file:///p#0.1.0` form where the name is the path's basename.
fn parse_package_name(package_id: &str) -> super::Result<String> {
    if let Some(at_pos) = package_id.find('@') {
        let before = &package_id[..at_pos];
        let name = before.rsplit('#').next().unwrap_or(before);
        ensure!(
            !name.is_empty(),
            MalformedPackageIdSnafu {
                package_id: package_id.to_string()
            }
        );
        return Ok(name.to_string());
    }
    let mut parts = package_id.splitn(2, '#');
    let path_part = parts.next().unwrap_or_default();
    let name = Path::new(path_part)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    ensure!(
        !name.is_empty(),
        MalformedPackageIdSnafu {
            package_id: package_id.to_string()
        }
    );
    Ok(name.to_string())
}

/// Build the full cargo invocation for a batch of bins/examples/packages
/// under the given axes, returning the argument vector and the
/// environment overrides needed for cross-compilation.
pub fn generate_cargo_build_command(
    axes: &BuildAxes,
    toolchain: &Toolchain,
    bins: &BTreeSet<String>,
    examples: &BTreeSet<String>,
    packages: &BTreeSet<String>,
    message_format_json: bool,
) -> (Vec<String>, HashMap<String, String>) {
    let mut args = vec!["build".to_string()];
    let mut env = HashMap::new();

    args.push("--target".to_string());
    args.push(toolchain.target_triple().to_string());
    args.push("--target-dir".to_string());
    args.push(axes.cargo_target_dir().to_string_lossy().into_owned());

    if axes.coverage {
        env.insert("RUSTFLAGS".to_string(), "-C instrument-coverage".to_string());
    } else if !axes.sanitizer.is_none() {
        let sanitizer_tag = axes.sanitizer.tag().expect("checked is_none above");
        env.insert(
            "RUSTFLAGS".to_string(),
            format!("-Z sanitizer={}", sanitizer_tag),
        );

        let sysroot = toolchain.sysroot();
        let cflags = format!(
            "--target={} --sysroot={} -fsanitize={}",
            toolchain.target_triple(),
            sysroot.display(),
            sanitizer_tag
        );
        env.insert("CC".to_string(), toolchain.cc().to_string_lossy().into_owned());
        env.insert("CXX".to_string(), toolchain.cxx().to_string_lossy().into_owned());
        env.insert("CFLAGS".to_string(), cflags.clone());
        env.insert("CXXFLAGS".to_string(), cflags);
        env.insert(
            format!(
                "CARGO_TARGET_{}_LINKER",
                toolchain
                    .target_triple()
                    .to_uppercase()
                    .replace('-', "_")
            ),
            toolchain.cc().to_string_lossy().into_owned(),
        );

        let path = std::env::var("PATH").unwrap_or_default();
        env.insert(
            "PATH".to_string(),
            format!(
                "{}:{}:{}",
                toolchain.sanitizer_shim_dir().display(),
                toolchain.bin_dir().display(),
                path
            ),
        );

        // Sanitizer-instrumented allocators aren't supported; building
        // without default features avoids linking the custom allocator.
        args.push("--no-default-features".to_string());
        let jobs = (2 * num_cpus::get() + 2) / 3;
        args.push("--jobs".to_string());
        args.push(jobs.max(1).to_string());
    } else {
        env.insert("RUSTFLAGS".to_string(), "--cfg=tokio_unstable".to_string());
    }

    for bin in bins {
        args.push("--bin".to_string());
        args.push(bin.clone());
    }
    for example in examples {
        args.push("--example".to_string());
        args.push(example.clone());
    }
    for package in packages {
        args.push("--package".to_string());
        args.push(package.clone());
    }

    if axes.release_mode {
        args.push("--release".to_string());
    }

    if message_format_json {
        args.push("--message-format=json".to_string());
    }

    (args, env)
}

/// Run the batched compile once for its human-readable output, then again
/// with machine-readable output to capture build-script directories —
/// the second run is a cache hit and only re-emits messages.
pub fn prepare_batch(
    actions: &[&NativeBuildAction],
    repo_root: &Path,
    axes: &BuildAxes,
    toolchain: &Toolchain,
    workspace: &WorkspaceGraph,
) -> super::Result<BuildMessages> {
    let mut bins = BTreeSet::new();
    let mut examples = BTreeSet::new();
    let mut packages = BTreeSet::new();

    for action in actions {
        for bin in &action.config.bins {
            bins.insert(bin.clone());
            packages.insert(
                workspace
                    .owning_package_name(bin, TargetKind::Bin)
                    .context(WorkspaceSnafu)?,
            );
        }
        for example in &action.config.examples {
            examples.insert(example.clone());
            packages.insert(
                workspace
                    .owning_package_name(example, TargetKind::Example)
                    .context(WorkspaceSnafu)?,
            );
        }
    }

    let (human_args, env) =
        generate_cargo_build_command(axes, toolchain, &bins, &examples, &packages, false);
    run_cargo(repo_root, &human_args, &env, false)?;

    let (json_args, env) =
        generate_cargo_build_command(axes, toolchain, &bins, &examples, &packages, true);
    let stdout = run_cargo(repo_root, &json_args, &env, true)?;

    parse_build_messages(&stdout, repo_root, toolchain)
}

fn run_cargo(
    repo_root: &Path,
    args: &[String],
    env: &HashMap<String, String>,
    capture_stdout: bool,
) -> super::Result<String> {
    let mut expr = duct::cmd("cargo", args).dir(repo_root);
    for (key, value) in env {
        expr = expr.env(key, value);
    }
    if capture_stdout {
        let output = expr
            .stdout_capture()
            .unchecked()
            .run()
            .context(CargoInvocationSnafu)?;
        ensure!(
            output.status.success(),
            CargoBuildFailedSnafu {
                status: output.status.code().unwrap_or(-1)
            }
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let status = expr.unchecked().run().context(CargoInvocationSnafu)?;
        ensure!(
            status.status.success(),
            CargoBuildFailedSnafu {
                status: status.status.code().unwrap_or(-1)
            }
        );
        Ok(String::new())
    }
}

fn parse_build_messages(
    stdout: &str,
    repo_root: &Path,
    toolchain: &Toolchain,
) -> super::Result<BuildMessages> {
    let mut outputs = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let raw: RawMessage =
            serde_json::from_str(line).context(BuildMessageParseSnafu)?;
        if raw.reason != "build-script-executed" {
            continue;
        }
        let Some(out_dir) = raw.out_dir else {
            continue;
        };
        let rewritten = toolchain.rewrite_builder_path_for_host(repo_root, &out_dir);
        if !rewritten.starts_with(repo_root.join("target-xcompile")) {
            // Host-side build script; not part of the cross-compiled batch.
            continue;
        }
        let package_name = parse_package_name(&raw.package_id)?;
        outputs.push(BuildScriptOutput {
            package_name,
            out_dir: rewritten,
        });
    }
    Ok(BuildMessages { outputs })
}

/// Copy the compiled artifacts for one `cargo-build` action into its image
/// directory, post-process them, then extract any declared build-script
/// output directories.
pub fn run(
    action: &NativeBuildAction,
    prep: &BuildMessages,
    repo_root: &Path,
    axes: &BuildAxes,
    toolchain: &Toolchain,
    image_dir: &Path,
) -> super::Result<()> {
    let profile_dir = if axes.release_mode { "release" } else { "debug" };
    let target_dir = axes
        .cargo_target_dir()
        .join(toolchain.target_triple())
        .join(profile_dir);

    for bin in &action.config.bins {
        copy_and_process(&target_dir.join(bin), &image_dir.join(bin), action.config.strip, toolchain)?;
    }
    for example in &action.config.examples {
        copy_and_process(
            &target_dir.join("examples").join(example),
            &image_dir.join(example),
            action.config.strip,
            toolchain,
        )?;
    }

    for (package, mapping) in &action.config.extract {
        let Some(out_dir) = prep.out_dir_for(package) else {
            continue;
        };
        for (src, dst) in mapping {
            copy_recursive(&out_dir.join(src), &image_dir.join(dst))?;
        }
    }

    let _ = repo_root;
    Ok(())
}

fn copy_and_process(
    src: &Path,
    dst: &Path,
    strip: bool,
    toolchain: &Toolchain,
) -> super::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
    }
    fs::copy(src, dst).context(CopySnafu {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
    })?;

    let tool = if strip {
        duct::cmd(toolchain.strip(), ["--strip-debug", &dst.to_string_lossy()])
    } else {
        duct::cmd(
            toolchain.objcopy(),
            [
                "--remove-section=.debug_pubnames",
                "--remove-section=.debug_pubtypes",
                &dst.to_string_lossy(),
            ],
        )
    };
    tool.run().context(PostProcessSnafu { path: dst.to_path_buf() })?;
    Ok(())
}

fn copy_recursive(src: &Path, dst: &Path) -> super::Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst).context(CreateDirSnafu { path: dst })?;
        for entry in fs::read_dir(src).context(CopySnafu {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
        })? {
            let entry = entry.context(CopySnafu {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
            })?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
        }
        fs::copy(src, dst).context(CopySnafu {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn package_id_at_form() {
        assert_eq!(
            parse_package_name("registry+https://example/crates-index#foo@1.2.3").unwrap(),
            "foo"
        );
    }

    #[test]
    fn package_id_hash_form() {
        assert_eq!(parse_package_name("file:///p/bar#0.1.0").unwrap(), "bar");
    }
}

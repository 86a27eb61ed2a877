//! An `Image` together with its resolved dependencies: computes its own
//! spec and fingerprint, rewrites its build file, and drives the external
//! builder.

pub mod error;

use crate::axes::BuildAxes;
use crate::builder::{Builder, RetryBudget};
use crate::fingerprint::{self, Fingerprint, SelfHasher};
use crate::image::Image;
use crate::preimage::{self, PreImageBatch};
use crate::toolchain::Toolchain;
use crate::workspace::WorkspaceGraph;
use crate::image::MZFROM_RE;
use error::*;
use snafu::{ensure, OptionExt, ResultExt};
use std::cell::{Cell, OnceCell};
use std::collections::HashMap;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

pub struct ResolvedImage {
    pub image: Image,
    fingerprint: OnceCell<Fingerprint>,
    acquired: Cell<bool>,
}

impl ResolvedImage {
    pub fn new(image: Image) -> Self {
        Self {
            image,
            fingerprint: OnceCell::new(),
            acquired: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.image.name
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.get()
    }

    pub fn mark_acquired(&self) {
        self.acquired.set(true);
    }

    /// `{registry}/{prefix}{name}:mzbuild-{base32(fingerprint)}`.
    pub fn spec(&self, axes: &BuildAxes, fingerprint: Fingerprint) -> String {
        format!(
            "{}/{}{}:mzbuild-{}",
            axes.registry, axes.prefix, self.image.name, fingerprint
        )
    }

    /// The canonical fingerprint algorithm: own inputs, pre-image
    /// `extra()`, the axis literals, then each dependency's name and
    /// fingerprint, sorted by name. Memoized: the first successful call is
    /// authoritative.
    pub fn fingerprint(
        &self,
        repo_root: &std::path::Path,
        axes: &BuildAxes,
        workspace: &WorkspaceGraph,
        dependency_fingerprints: &[(String, Fingerprint)],
    ) -> Result<Fingerprint> {
        if let Some(f) = self.fingerprint.get() {
            return Ok(*f);
        }

        let mut own_inputs: Vec<PathBuf> =
            crate::vcs::walk_tracked_files(&self.image.path).collect();
        for pre_image in &self.image.pre_images {
            let extra = pre_image
                .inputs(repo_root, workspace)
                .context(PreImageSnafu)?;
            own_inputs.extend(extra);
        }

        ensure!(
            !own_inputs.is_empty(),
            NoTrackedFilesSnafu {
                name: self.image.name.clone(),
            }
        );

        let mut hasher = SelfHasher::new();
        for (absolute, relative) in fingerprint::sorted_relative(repo_root, own_inputs) {
            hasher
                .feed_input(&absolute, &relative)
                .context(InputReadSnafu { path: absolute })?;
        }
        for pre_image in &self.image.pre_images {
            hasher.feed_extra(&pre_image.extra(axes));
        }
        for literal in axes.fingerprint_literals() {
            hasher.feed_literal(&literal);
        }

        let self_hash = hasher.finish();
        let computed = fingerprint::full_hash(self_hash, dependency_fingerprints);

        Ok(*self.fingerprint.get_or_init(|| computed))
    }

    /// Rewrite every `MZFROM <name>` line in the build file to
    /// `FROM <dep-spec>`. No other transformation; line count and
    /// ordering are preserved.
    pub fn write_dockerfile(&self, dependency_specs: &HashMap<String, String>) -> Result<Vec<u8>> {
        let contents =
            std::fs::read(self.image.build_file()).context(BuildFileReadSnafu {
                path: self.image.build_file(),
            })?;

        let mut out = Vec::with_capacity(contents.len());
        let mut last_end = 0;
        for cap in MZFROM_RE.captures_iter(&contents) {
            let whole = cap.get(0).unwrap();
            let name = cap.get(1).unwrap();
            let name_str = String::from_utf8_lossy(name.as_bytes()).into_owned();
            let spec = dependency_specs
                .get(&name_str)
                .context(UnresolvedDependencySnafu { name: name_str })?;

            out.extend_from_slice(&contents[last_end..whole.start()]);
            out.extend_from_slice(format!("FROM {}", spec).as_bytes());
            last_end = whole.end();
        }
        out.extend_from_slice(&contents[last_end..]);
        Ok(out)
    }

    /// Build this image: purge untracked output, run every pre-image
    /// action, then invoke the external builder with the rewritten build
    /// file and the injected arch build args.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        builder: &Builder,
        repo_root: &std::path::Path,
        axes: &BuildAxes,
        toolchain: &Toolchain,
        workspace: &WorkspaceGraph,
        prep: &PreImageBatch,
        dependency_specs: &HashMap<String, String>,
        tag: &str,
    ) -> Result<()> {
        crate::vcs::purge_untracked(&self.image.path).context(PurgeSnafu {
            path: self.image.path.clone(),
        })?;

        for pre_image in &self.image.pre_images {
            preimage::run(pre_image, prep, repo_root, axes, toolchain, &self.image.path)
                .context(PreImageSnafu)?;
        }

        let dockerfile = self.write_dockerfile(dependency_specs)?;

        let mut build_args = self.image.build_args.clone();
        build_args.insert("ARCH_GCC".to_string(), axes.arch.gcc_triple().to_string());
        build_args.insert("ARCH_GO".to_string(), axes.arch.goarch().to_string());

        builder
            .build(
                &dockerfile,
                &self.image.path,
                &build_args,
                &format!("linux/{}", axes.arch.goarch()),
                tag,
            )
            .context(BuildSnafu)?;

        self.mark_acquired();
        Ok(())
    }

    pub fn try_pull(&self, builder: &Builder, tag: &str, budget: RetryBudget) -> Result<bool> {
        if self.is_acquired() {
            return Ok(true);
        }
        match builder.pull(tag, budget) {
            Ok(()) => {
                self.mark_acquired();
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    pub fn is_published_if_necessary(&self, builder: &Builder, tag: &str) -> bool {
        !self.image.publish || builder.manifest_exists(tag)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::axes::{Arch, Sanitizer};
    use std::fs;
    use tempfile::TempDir;

    fn bare_image(name: &str, dir: &std::path::Path) -> Image {
        Image {
            name: name.to_string(),
            path: dir.to_path_buf(),
            publish: true,
            mainline: true,
            description: None,
            depends_on: Vec::new(),
            pre_images: Vec::new(),
            build_args: HashMap::new(),
        }
    }

    fn axes(root: PathBuf) -> BuildAxes {
        BuildAxes {
            root,
            arch: Arch::X86_64,
            release_mode: false,
            coverage: false,
            sanitizer: Sanitizer::None,
            registry: "example.com/repo".to_string(),
            prefix: "".to_string(),
        }
    }

    #[test]
    fn not_acquired_until_marked() {
        let tmp = TempDir::new().unwrap();
        let resolved = ResolvedImage::new(bare_image("a", tmp.path()));
        assert!(!resolved.is_acquired());
        resolved.mark_acquired();
        assert!(resolved.is_acquired());
    }

    #[test]
    fn try_pull_short_circuits_when_already_acquired() {
        let tmp = TempDir::new().unwrap();
        let resolved = ResolvedImage::new(bare_image("a", tmp.path()));
        resolved.mark_acquired();

        let builder = Builder::new();
        let pulled = resolved
            .try_pull(&builder, "example.com/repo/a:mzbuild-doesnotmatter", RetryBudget(None))
            .unwrap();
        assert!(pulled);
    }

    #[test]
    fn spec_is_registry_prefix_name_tag() {
        let tmp = TempDir::new().unwrap();
        let resolved = ResolvedImage::new(bare_image("widget", tmp.path()));
        let fingerprint = Fingerprint([0u8; 20]);
        let spec = resolved.spec(&axes(tmp.path().to_path_buf()), fingerprint);
        assert_eq!(spec, format!("example.com/repo/widget:mzbuild-{}", fingerprint));
    }

    #[test]
    fn write_dockerfile_rewrites_only_mzfrom_lines() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("Dockerfile"),
            "MZFROM child\nRUN echo hi\nMZFROM other-child\n",
        )
        .unwrap();
        let resolved = ResolvedImage::new(bare_image("parent", tmp.path()));

        let mut specs = HashMap::new();
        specs.insert("child".to_string(), "registry/child:mzbuild-aaa".to_string());
        specs.insert(
            "other-child".to_string(),
            "registry/other-child:mzbuild-bbb".to_string(),
        );

        let rewritten = String::from_utf8(resolved.write_dockerfile(&specs).unwrap()).unwrap();
        assert_eq!(
            rewritten,
            "FROM registry/child:mzbuild-aaa\nRUN echo hi\nFROM registry/other-child:mzbuild-bbb\n"
        );
    }

    #[test]
    fn write_dockerfile_fails_on_unresolved_mzfrom() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Dockerfile"), "MZFROM ghost\n").unwrap();
        let resolved = ResolvedImage::new(bare_image("parent", tmp.path()));

        let err = resolved.write_dockerfile(&HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency { .. }));
    }
}

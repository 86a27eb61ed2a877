//! A topologically ordered collection of resolved images: orchestrates
//! batched pre-image preparation, pull-or-build acquisition, build+push
//! ("ensure"), and publish-only checking.

pub mod error;

use crate::axes::BuildAxes;
use crate::builder::{self, Builder, RetryBudget};
use crate::fingerprint::Fingerprint;
use crate::preimage::{self, PreImage, PreImageBatch};
use crate::repository::Repository;
use crate::resolved_image::ResolvedImage;
use crate::resolver;
use crate::toolchain::Toolchain;
use crate::workspace::WorkspaceGraph;
use error::*;
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

pub struct DependencySet {
    root: PathBuf,
    axes: BuildAxes,
    toolchain: Toolchain,
    workspace: WorkspaceGraph,
    order: Vec<String>,
    resolved: HashMap<String, ResolvedImage>,
}

impl DependencySet {
    /// Resolve `targets` against `repo` into a topological order, wrap each
    /// image for orchestration, and seed `acquired` from what the local
    /// registry already has, so a second run in a fresh process doesn't
    /// re-pull or re-build what it already has.
    pub fn new(
        repo: &Repository,
        targets: &[String],
        axes: BuildAxes,
        toolchain: Toolchain,
        workspace: WorkspaceGraph,
        builder: &Builder,
    ) -> Result<Self> {
        let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let order =
            resolver::resolve_dependencies(target_refs, &repo.images).context(ResolverSnafu)?;

        let mut resolved = HashMap::new();
        for name in &order {
            let image = repo
                .images
                .get(name)
                .expect("resolver only returns names present in the repository")
                .clone();
            resolved.insert(name.clone(), ResolvedImage::new(image));
        }

        let set = Self {
            root: repo.root.clone(),
            axes,
            toolchain,
            workspace,
            order,
            resolved,
        };

        let local = builder.local_specs().context(BuilderSnafu)?;
        for (name, spec) in set.specs()? {
            if local.contains(&spec) {
                set.resolved[&name].mark_acquired();
            }
        }

        Ok(set)
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    fn fingerprint_of(
        &self,
        name: &str,
        cache: &mut HashMap<String, Fingerprint>,
    ) -> Result<Fingerprint> {
        if let Some(f) = cache.get(name) {
            return Ok(*f);
        }
        let resolved = &self.resolved[name];
        let mut dependency_fingerprints = Vec::with_capacity(resolved.image.depends_on.len());
        for dep in &resolved.image.depends_on {
            let f = self.fingerprint_of(dep, cache)?;
            dependency_fingerprints.push((dep.clone(), f));
        }
        let fingerprint = resolved
            .fingerprint(&self.root, &self.axes, &self.workspace, &dependency_fingerprints)
            .context(ResolvedImageSnafu)?;
        cache.insert(name.to_string(), fingerprint);
        Ok(fingerprint)
    }

    /// Every image's fully qualified registry spec, keyed by name.
    pub fn specs(&self) -> Result<HashMap<String, String>> {
        let mut cache = HashMap::new();
        let mut specs = HashMap::new();
        for name in &self.order {
            let fingerprint = self.fingerprint_of(name, &mut cache)?;
            specs.insert(name.clone(), self.resolved[name].spec(&self.axes, fingerprint));
        }
        Ok(specs)
    }

    fn prepare_batch(&self, names: &[String]) -> Result<PreImageBatch> {
        let pre_images: Vec<&PreImage> = names
            .iter()
            .flat_map(|name| self.resolved[name].image.pre_images.iter())
            .collect();
        preimage::prepare_batch(&pre_images, &self.root, &self.axes, &self.toolchain, &self.workspace)
            .context(PreImageSnafu)
    }

    /// Pull every dependency that's available remotely; build the rest.
    /// Pre-image preparation for the to-build set happens exactly once,
    /// after all pulls have been attempted.
    pub fn acquire(&self, builder: &Builder, budget: RetryBudget) -> Result<()> {
        let specs = self.specs()?;
        let mut to_build = Vec::new();

        for name in &self.order {
            let resolved = &self.resolved[name];
            let pulled = resolved
                .try_pull(builder, &specs[name], budget)
                .context(ResolvedImageSnafu)?;
            if !pulled {
                to_build.push(name.clone());
            }
        }

        let prep = self.prepare_batch(&to_build)?;

        for name in &to_build {
            let resolved = &self.resolved[name];
            resolved
                .build(
                    builder,
                    &self.root,
                    &self.axes,
                    &self.toolchain,
                    &self.workspace,
                    &prep,
                    &specs,
                    &specs[name],
                )
                .context(ResolvedImageSnafu)?;
        }
        Ok(())
    }

    /// Build whatever isn't already published, invoking `post_build` after
    /// each local build, then push every newly built publishable image in
    /// parallel. The first nonzero push exit is surfaced as a failure.
    pub fn ensure(&self, builder: &Builder, mut post_build: impl FnMut(&str)) -> Result<()> {
        let specs = self.specs()?;
        let mut to_build = Vec::new();

        for name in &self.order {
            let resolved = &self.resolved[name];
            if !resolved.is_published_if_necessary(builder, &specs[name]) {
                to_build.push(name.clone());
            }
        }

        let prep = self.prepare_batch(&to_build)?;
        let mut to_push = Vec::new();

        for name in &to_build {
            let resolved = &self.resolved[name];
            resolved
                .build(
                    builder,
                    &self.root,
                    &self.axes,
                    &self.toolchain,
                    &self.workspace,
                    &prep,
                    &specs,
                    &specs[name],
                )
                .context(ResolvedImageSnafu)?;
            post_build(name);
            if resolved.image.publish {
                to_push.push(specs[name].clone());
            }
        }

        builder::push_all(builder, &to_push).context(BuilderSnafu)
    }

    /// Whether every publishable image in the order is already published,
    /// without pulling or building anything.
    pub fn check(&self, builder: &Builder) -> Result<bool> {
        let specs = self.specs()?;
        Ok(self
            .order
            .iter()
            .all(|name| self.resolved[name].is_published_if_necessary(builder, &specs[name])))
    }
}

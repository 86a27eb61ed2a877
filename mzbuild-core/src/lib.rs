//! Content-addressed build orchestration for container images.
//!
//! A repository is a tree of directories, each holding an `mzbuild.yml`
//! manifest and a `Dockerfile`. [`repository::Repository::discover`] walks
//! the tree into a set of [`image::Image`]s; [`resolver::resolve_dependencies`]
//! orders a target set topologically over their `MZFROM` edges;
//! [`dependency_set::DependencySet`] ties the two together with a
//! [`fingerprint::Fingerprint`] per image and drives the external
//! [`builder::Builder`] to pull, build, and push.
//!
//! Everything in this crate runs on a single thread; all concurrency is
//! external, realized as subprocesses spawned via `duct`.

pub mod axes;
pub mod builder;
pub mod dependency_set;
pub mod fingerprint;
pub mod image;
pub mod manifest;
pub mod preimage;
pub mod repository;
pub mod resolved_image;
pub mod resolver;
pub mod toolchain;
pub mod vcs;
pub mod workspace;

pub use axes::{Arch, BuildAxes, Sanitizer};
pub use builder::{Builder, RetryBudget};
pub use dependency_set::DependencySet;
pub use fingerprint::Fingerprint;
pub use repository::Repository;
pub use resolved_image::ResolvedImage;
pub use toolchain::Toolchain;
pub use workspace::{TargetKind, WorkspaceGraph};

//! Topological sort over the image dependency DAG, with cycle detection
//! that reports the offending path.

pub mod error;

use crate::image::Image;
use error::*;
use snafu::OptionExt;
use std::collections::{HashMap, HashSet};

pub type Result<T> = std::result::Result<T, Error>;

/// Resolve `targets` (image names) against `images` into a topological
/// order: every image appears after all of its dependencies. Both the
/// target set and each image's children are visited in name-sorted order
/// so that the result is deterministic regardless of discovery order.
pub fn resolve_dependencies<'a>(
    targets: impl IntoIterator<Item = &'a str>,
    images: &HashMap<String, Image>,
) -> Result<Vec<String>> {
    let mut resolved: Vec<String> = Vec::new();
    let mut resolved_set: HashSet<String> = HashSet::new();
    let mut visiting: Vec<String> = Vec::new();

    let mut targets: Vec<&str> = targets.into_iter().collect();
    targets.sort_unstable();

    for target in targets {
        visit(target, images, &mut resolved, &mut resolved_set, &mut visiting)?;
    }

    Ok(resolved)
}

fn visit(
    name: &str,
    images: &HashMap<String, Image>,
    resolved: &mut Vec<String>,
    resolved_set: &mut HashSet<String>,
    visiting: &mut Vec<String>,
) -> Result<()> {
    if resolved_set.contains(name) {
        return Ok(());
    }
    if visiting.iter().any(|v| v == name) {
        let mut path = visiting.clone();
        path.push(name.to_string());
        return Err(Error::CircularDependency { path });
    }

    let image = images.get(name).context(UnknownTargetSnafu { name })?;

    visiting.push(name.to_string());

    let mut children = image.depends_on.clone();
    children.sort();
    for child in &children {
        visit(child, images, resolved, resolved_set, visiting)?;
    }

    visiting.pop();
    resolved_set.insert(name.to_string());
    resolved.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::Image;
    use std::path::PathBuf;

    fn image(name: &str, depends_on: &[&str]) -> Image {
        Image {
            name: name.to_string(),
            path: PathBuf::new(),
            publish: true,
            mainline: true,
            description: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            pre_images: Vec::new(),
            build_args: Default::default(),
        }
    }

    fn images(list: &[Image]) -> HashMap<String, Image> {
        list.iter().cloned().map(|i| (i.name.clone(), i)).collect()
    }

    #[test]
    fn linear_order() {
        let images = images(&[image("a", &["b"]), image("b", &["c"]), image("c", &[])]);
        let order = resolve_dependencies(["a"], &images).unwrap();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn diamond_visits_shared_dep_once() {
        let images = images(&[
            image("a", &["b", "c"]),
            image("b", &["d"]),
            image("c", &["d"]),
            image("d", &[]),
        ]);
        let order = resolve_dependencies(["a"], &images).unwrap();
        assert_eq!(order, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn detects_cycle_with_path() {
        let images = images(&[image("a", &["b"]), image("b", &["c"]), image("c", &["a"])]);
        let err = resolve_dependencies(["a"], &images).unwrap_err();
        match err {
            Error::CircularDependency { path } => {
                assert_eq!(path, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn unknown_target_is_an_error() {
        let images = images(&[image("a", &[])]);
        let err = resolve_dependencies(["missing"], &images).unwrap_err();
        assert!(matches!(err, Error::UnknownTarget { .. }));
    }
}

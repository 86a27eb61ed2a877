/*!
Parses the per-image manifest, `mzbuild.yml`, found alongside a container
build file.

```yaml
name: my-image
publish: true
mainline: true
description: an example image
pre-image:
  - type: copy
    source: misc/scripts
    destination: scripts
    matching: "*.sh"
  - type: cargo-build
    bin: [my-image-bin]
    strip: true
    extract:
      my-image-bin:
        out/assets: assets
build-args:
  FOO: bar
```

Unknown top-level keys are ignored; an unrecognized `pre-image` `type` is a
parse error naming the offending image path.
*/

pub mod error;

use crate::preimage::{CopyConfig, NativeBuildConfig, PreImageConfig};
use error::*;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

const NAME_PATTERN: &str = r"^[A-Za-z0-9-]+$";

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawImageManifest {
    name: String,
    #[serde(default = "default_true")]
    publish: bool,
    #[serde(default = "default_true")]
    mainline: bool,
    description: Option<String>,
    #[serde(default)]
    pre_image: Vec<RawPreImage>,
    #[serde(default)]
    build_args: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RawPreImage {
    Copy {
        source: String,
        destination: String,
        #[serde(default = "default_matching")]
        matching: String,
    },
    CargoBuild {
        #[serde(default, deserialize_with = "one_or_many")]
        bin: Vec<String>,
        #[serde(default, deserialize_with = "one_or_many")]
        example: Vec<String>,
        #[serde(default = "default_true")]
        strip: bool,
        #[serde(default)]
        extract: HashMap<String, HashMap<String, String>>,
    },
}

fn default_matching() -> String {
    "*".to_string()
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

/// A parsed, validated per-image manifest.
#[derive(Debug, Clone)]
pub struct ImageManifest {
    pub name: String,
    pub publish: bool,
    pub mainline: bool,
    pub description: Option<String>,
    pub pre_image: Vec<PreImageConfig>,
    pub build_args: HashMap<String, String>,
}

impl ImageManifest {
    /// Read and validate the manifest at `path` (the image's `mzbuild.yml`).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context(ManifestReadSnafu { path })?;
        let raw: RawImageManifest =
            serde_yaml::from_str(&contents).context(ManifestParseSnafu { path })?;
        Self::validate(raw, path)
    }

    fn validate(raw: RawImageManifest, path: &Path) -> Result<Self> {
        let name_re = regex::Regex::new(NAME_PATTERN).expect("static regex is valid");
        snafu::ensure!(
            name_re.is_match(&raw.name),
            InvalidNameSnafu {
                path,
                name: raw.name.clone(),
            }
        );

        let mut pre_image = Vec::with_capacity(raw.pre_image.len());
        for entry in raw.pre_image {
            pre_image.push(match entry {
                RawPreImage::Copy {
                    source,
                    destination,
                    matching,
                } => PreImageConfig::Copy(CopyConfig {
                    source,
                    destination,
                    matching,
                }),
                RawPreImage::CargoBuild {
                    bin,
                    example,
                    strip,
                    extract,
                } => {
                    snafu::ensure!(
                        !bin.is_empty() || !example.is_empty(),
                        EmptyCargoBuildSnafu { path, name: &raw.name }
                    );
                    PreImageConfig::CargoBuild(NativeBuildConfig {
                        bins: bin,
                        examples: example,
                        strip,
                        extract,
                    })
                }
            });
        }

        Ok(Self {
            name: raw.name,
            publish: raw.publish,
            mainline: raw.mainline,
            description: raw.description,
            pre_image,
            build_args: raw.build_args,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_manifest(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_manifest_defaults() {
        let f = write_manifest("name: alpha\n");
        let manifest = ImageManifest::load(f.path()).unwrap();
        assert_eq!(manifest.name, "alpha");
        assert!(manifest.publish);
        assert!(manifest.mainline);
        assert!(manifest.pre_image.is_empty());
    }

    #[test]
    fn rejects_invalid_name() {
        let f = write_manifest("name: \"not valid!\"\n");
        let err = ImageManifest::load(f.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));
    }

    #[test]
    fn rejects_empty_cargo_build() {
        let f = write_manifest(
            "name: alpha\npre-image:\n  - type: cargo-build\n    strip: true\n",
        );
        let err = ImageManifest::load(f.path()).unwrap_err();
        assert!(matches!(err, Error::EmptyCargoBuild { .. }));
    }

    #[test]
    fn parses_copy_and_cargo_build() {
        let f = write_manifest(
            r#"
name: beta
pre-image:
  - type: copy
    source: libs
    destination: vendor
    matching: "*.txt"
  - type: cargo-build
    bin: beta-bin
    strip: false
    extract:
      beta-bin:
        out/assets: assets
build-args:
  FOO: bar
"#,
        );
        let manifest = ImageManifest::load(f.path()).unwrap();
        assert_eq!(manifest.pre_image.len(), 2);
        assert_eq!(manifest.build_args.get("FOO"), Some(&"bar".to_string()));
        match &manifest.pre_image[1] {
            PreImageConfig::CargoBuild(cfg) => {
                assert_eq!(cfg.bins, vec!["beta-bin".to_string()]);
                assert!(!cfg.strip);
            }
            _ => panic!("expected cargo-build"),
        }
    }
}

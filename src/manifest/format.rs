// src/manifest/format.rs

//! Manifest file format definitions
//!
//! Manifests are TOML files describing one version of one package: where the
//! source comes from, what it depends on, how to build and install it, and
//! how to smoke-test the result. These types mirror the file layout; the
//! parser turns them into a validated [`Manifest`](super::Manifest).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A manifest file as written on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    /// Package metadata
    pub package: PackageSection,

    /// Source archive location and checksum
    #[serde(default)]
    pub source: SourceSection,

    /// Declared build options (`with-<feature>`)
    #[serde(default)]
    pub options: BTreeMap<String, OptionSection>,

    /// Dependencies in declaration order
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,

    /// Install steps, run in order
    #[serde(default)]
    pub install: Vec<StepEntry>,

    /// Files copied from the build tree into the prefix
    #[serde(default)]
    pub artifacts: ArtifactSection,

    /// Post-install verification
    #[serde(default)]
    pub test: Option<StepEntry>,

    /// Variables for `%(name)s` substitution
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,

    /// Derived from the source URL when omitted
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    /// VCS URL for development builds
    #[serde(default)]
    pub head: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,
}

/// Source archive section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    /// Archive URL; `%(version)s` is substituted
    #[serde(default)]
    pub url: Option<String>,

    /// `sha256:<hex>` or `xxh128:<hex>`
    #[serde(default)]
    pub checksum: Option<String>,
}

/// A declared option
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSection {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub default: bool,
}

/// When a dependency is needed
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Needed only while building
    #[serde(alias = "build-only")]
    #[strum(to_string = "build", serialize = "build-only")]
    Build,
    /// Needed by the installed package
    #[default]
    Runtime,
    /// Needed only when its option is enabled
    Optional,
}

/// A dependency declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyEntry {
    pub name: String,

    #[serde(default)]
    pub phase: Phase,

    /// Guard expression over options
    #[serde(default)]
    pub condition: Option<String>,

    /// Options requested from the dependency itself
    #[serde(default)]
    pub options: Vec<ForwardedOptionEntry>,
}

/// An option forwarded to a dependency
///
/// Either a bare flag (`"with-python"`) or a guarded table
/// (`{ flag = "with-python", when = "with-python" }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForwardedOptionEntry {
    Flag(String),
    Guarded(GuardedOptionEntry),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardedOptionEntry {
    pub flag: String,
    /// Forward only while this condition holds
    pub when: String,
}

/// One external command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepEntry {
    /// Defaults to the tool name
    #[serde(default)]
    pub name: Option<String>,

    pub tool: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Guard expression; the step is skipped when false
    #[serde(default)]
    pub when: Option<String>,

    /// Extra environment for this step
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Artifacts grouped by destination directory under the prefix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSection {
    #[serde(default)]
    pub bin: Vec<String>,

    #[serde(default)]
    pub lib: Vec<String>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub share: Vec<String>,
}

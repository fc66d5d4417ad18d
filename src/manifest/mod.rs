// src/manifest/mod.rs

//! Package manifests
//!
//! A manifest describes one version of one package:
//! - Source archive and its checksum
//! - Declared options and dependencies (build, runtime, optional)
//! - Install steps (external commands, optionally guarded by options)
//! - Artifacts copied into the install prefix
//! - A post-install test step
//!
//! # Example Manifest
//!
//! ```toml
//! [package]
//! name = "synth"
//! homepage = "https://github.com/ajg/synth"
//!
//! [source]
//! url = "https://github.com/ajg/synth/archive/v0.52.0.tar.gz"
//! checksum = "sha256:..."
//!
//! [[dependencies]]
//! name = "scons"
//! phase = "build"
//!
//! [[dependencies]]
//! name = "python"
//! phase = "optional"
//! condition = "with-python"
//!
//! [[install]]
//! tool = "scons"
//! args = ["synth", "debug=0", "boost=system"]
//!
//! [[install]]
//! tool = "python"
//! args = ["setup.py", "install", "--prefix=%(prefix)s"]
//! when = "with-python"
//!
//! [artifacts]
//! bin = ["synth"]
//!
//! [test]
//! tool = "%(bin)s/synth"
//! args = ["--version"]
//! ```
//!
//! A parsed [`Manifest`] is immutable: all fields are private and exposed
//! through shared references only.

mod condition;
mod format;
pub mod parser;
mod version;

pub use condition::{Condition, ConditionError, UnknownOption};
pub use format::{ManifestFile, Phase};
pub use parser::{parse_manifest, parse_manifest_file, validate_manifest};
pub use version::PackageVersion;

use crate::hash::Hash;
use crate::options::OptionSet;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Variables every template can reference without declaring them
pub const BUILTIN_VARIABLES: &[&str] = &[
    "name", "version", "prefix", "bin", "lib", "include", "share", "srcdir",
];

static TEMPLATE_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\(([A-Za-z0-9_]+)\)s").expect("static regex"));

/// A validated package manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    name: String,
    homepage: Option<String>,
    head: Option<String>,
    summary: Option<String>,
    license: Option<String>,
    source_url: Option<String>,
    checksum: Option<Hash>,
    version: PackageVersion,
    options: BTreeMap<String, OptionDecl>,
    dependencies: Vec<Dependency>,
    install_steps: Vec<Step>,
    artifacts: Vec<Artifact>,
    test_step: Step,
    variables: BTreeMap<String, String>,
}

/// A declared option and its default state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    pub description: Option<String>,
    pub default: bool,
    /// Declared implicitly by an optional dependency
    pub implicit: bool,
}

/// A dependency on another package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub phase: Phase,
    pub condition: Option<Condition>,
    /// Options forwarded to the provider when installing this dependency
    pub options: Vec<ForwardedOption>,
}

/// An option flag passed on to a dependency, possibly guarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedOption {
    pub flag: String,
    pub when: Option<Condition>,
}

impl ForwardedOption {
    /// Whether the flag is forwarded under `options`
    pub fn is_enabled(&self, options: &OptionSet) -> Result<bool, UnknownOption> {
        match &self.when {
            Some(cond) => cond.evaluate(options),
            None => Ok(true),
        }
    }
}

impl Dependency {
    /// The option that switches an optional dependency on
    pub fn implicit_option(&self) -> String {
        format!("with-{}", self.name)
    }
}

/// One external command in the recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub tool: String,
    pub args: Vec<String>,
    pub when: Option<Condition>,
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Whether the guard allows this step to run
    pub fn is_enabled(&self, options: &OptionSet) -> Result<bool, UnknownOption> {
        match &self.when {
            Some(cond) => cond.evaluate(options),
            None => Ok(true),
        }
    }

    /// Program and arguments with variables substituted
    pub fn command_line(&self, vars: &BTreeMap<String, String>) -> (String, Vec<String>) {
        let program = substitute(&self.tool, vars);
        let args = self.args.iter().map(|a| substitute(a, vars)).collect();
        (program, args)
    }
}

/// Destination directory of an artifact under the prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    Bin,
    Lib,
    Include,
    Share,
}

impl ArtifactKind {
    pub fn dir(&self, prefix: &Path) -> PathBuf {
        prefix.join(self.to_string())
    }
}

/// A file copied from the build tree into the prefix after install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Relative to the source tree
    pub path: String,
}

impl Manifest {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    /// Source URL with `%(version)s` already substituted
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn checksum(&self) -> Option<&Hash> {
        self.checksum.as_ref()
    }

    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    pub fn options(&self) -> &BTreeMap<String, OptionDecl> {
        &self.options
    }

    /// Options in `options` this manifest never declares
    ///
    /// They are harmless to resolution but usually a typo on the command line.
    pub fn undeclared_options<'a>(&self, options: &'a OptionSet) -> Vec<&'a str> {
        options
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !self.options.contains_key(*name))
            .collect()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn install_steps(&self) -> &[Step] {
        &self.install_steps
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn test_step(&self) -> &Step {
        &self.test_step
    }

    pub fn user_variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Option set holding every declared option at its default
    pub fn default_options(&self) -> OptionSet {
        let mut set = OptionSet::new();
        for (name, decl) in &self.options {
            set.set(name.clone(), decl.default);
        }
        set
    }

    /// Archive file name taken from the source URL
    pub fn archive_filename(&self) -> Option<String> {
        let url = self.source_url.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.rsplit('/')
            .next()
            .filter(|f| !f.is_empty())
            .map(|f| f.to_string())
    }

    /// Variables available to step templates for an install into `prefix`
    /// from the source tree `srcdir`
    pub fn variables(&self, prefix: &Path, srcdir: &Path) -> BTreeMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("name".to_string(), self.name.clone());
        vars.insert("version".to_string(), self.version.to_string());
        vars.insert("prefix".to_string(), prefix.display().to_string());
        for kind in [
            ArtifactKind::Bin,
            ArtifactKind::Lib,
            ArtifactKind::Include,
            ArtifactKind::Share,
        ] {
            vars.insert(kind.to_string(), kind.dir(prefix).display().to_string());
        }
        vars.insert("srcdir".to_string(), srcdir.display().to_string());
        vars
    }
}

/// Replace `%(name)s` patterns with their values
///
/// Unknown names are left untouched.
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    TEMPLATE_VARIABLE
        .replace_all(template, |caps: &regex::Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names referenced by `%(name)s` patterns in a template
pub(crate) fn template_variables(template: &str) -> Vec<&str> {
    TEMPLATE_VARIABLE
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

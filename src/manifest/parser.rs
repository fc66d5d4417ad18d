// src/manifest/parser.rs

//! Manifest parsing and validation
//!
//! Parsing is pure: the same text always yields an equal [`Manifest`] or the
//! same error. Structural problems are fatal ([`Error::MalformedManifest`]);
//! [`validate_manifest`] reports softer issues as warnings.

use super::format::{ArtifactSection, ForwardedOptionEntry, ManifestFile, StepEntry};
use super::{
    Artifact, ArtifactKind, BUILTIN_VARIABLES, Condition, Dependency, ForwardedOption, Manifest,
    OptionDecl,
    PackageVersion, Phase, Step, substitute, template_variables,
};
use crate::error::{Error, Result};
use crate::hash::Hash;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};
use tracing::debug;

/// Parse a manifest from TOML text
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let file: ManifestFile =
        toml::from_str(content).map_err(|e| Error::malformed("manifest", e.message()))?;

    build_manifest(file)
}

/// Parse a manifest from a file
pub fn parse_manifest_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)?;
    let manifest = parse_manifest(&content)?;
    debug!(path = %path.display(), name = manifest.name(), "parsed manifest");
    Ok(manifest)
}

/// Check a parsed manifest for non-fatal issues
pub fn validate_manifest(manifest: &Manifest) -> Vec<String> {
    let mut warnings = Vec::new();

    if manifest.homepage().is_none() {
        warnings.push("Missing package homepage".to_string());
    }
    if manifest.summary().is_none() {
        warnings.push("Missing package summary".to_string());
    }
    if manifest.license().is_none() {
        warnings.push("Missing package license".to_string());
    }
    if manifest.source_url().is_none() {
        warnings.push("No source URL; a local source tree must be supplied".to_string());
    }

    // An optional dependency nobody guards on is pulled in but never used
    let guarded: HashSet<&str> = manifest
        .install_steps()
        .iter()
        .filter_map(|s| s.when.as_ref())
        .flat_map(|c| c.options())
        .collect();
    for dep in manifest.dependencies() {
        if dep.phase != Phase::Optional {
            continue;
        }
        let switches: Vec<String> = match &dep.condition {
            Some(cond) => cond.options().into_iter().map(str::to_string).collect(),
            None => vec![dep.implicit_option()],
        };
        if !switches.iter().any(|o| guarded.contains(o.as_str())) {
            warnings.push(format!(
                "Optional dependency '{}' is not referenced by any install step guard",
                dep.name
            ));
        }
    }

    warnings
}

fn build_manifest(file: ManifestFile) -> Result<Manifest> {
    let name = file.package.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::malformed("package.name", "must not be empty"));
    }

    let variables = check_variables(file.variables)?;

    let raw_url = file
        .source
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let version = match file.package.version.as_deref() {
        Some(v) => PackageVersion::parse(v).map_err(|e| Error::malformed("package.version", e))?,
        None => raw_url
            .and_then(PackageVersion::from_url)
            .ok_or_else(|| {
                Error::malformed(
                    "package.version",
                    "not declared and cannot be derived from the source URL",
                )
            })?,
    };

    let source_url = raw_url.map(|url| {
        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), name.clone());
        vars.insert("version".to_string(), version.to_string());
        substitute(url, &vars)
    });

    let checksum = match file.source.checksum.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Some(
            Hash::parse_prefixed(text)
                .map_err(|e| Error::malformed("source.checksum", e.to_string()))?,
        ),
        _ => None,
    };
    if source_url.is_some() && checksum.is_none() {
        return Err(Error::malformed(
            "source.checksum",
            "required when a source URL is given",
        ));
    }

    let mut options = BTreeMap::new();
    for (key, decl) in file.options {
        if !is_option_name(&key) {
            return Err(Error::malformed(
                format!("options.{}", key),
                "option names must have the form with-<feature>",
            ));
        }
        options.insert(
            key,
            OptionDecl {
                description: decl.description,
                default: decl.default,
                implicit: false,
            },
        );
    }

    let mut dependencies = Vec::with_capacity(file.dependencies.len());
    let mut seen = HashSet::new();
    for (i, entry) in file.dependencies.into_iter().enumerate() {
        let dep_name = entry.name.trim().to_string();
        if dep_name.is_empty() {
            return Err(Error::malformed(
                format!("dependencies[{}].name", i),
                "must not be empty",
            ));
        }
        if !seen.insert(dep_name.clone()) {
            return Err(Error::malformed(
                format!("dependencies[{}].name", i),
                format!("duplicate dependency '{}'", dep_name),
            ));
        }

        let condition = entry
            .condition
            .as_deref()
            .map(Condition::parse)
            .transpose()
            .map_err(|e| Error::malformed(format!("dependencies[{}].condition", i), e.to_string()))?;

        let mut forwarded = Vec::with_capacity(entry.options.len());
        for (j, option) in entry.options.into_iter().enumerate() {
            let field = format!("dependencies[{}].options[{}]", i, j);
            let (flag, when) = match option {
                ForwardedOptionEntry::Flag(flag) => (flag, None),
                ForwardedOptionEntry::Guarded(guarded) => (guarded.flag, Some(guarded.when)),
            };
            if !is_option_name(&flag) && !flag.starts_with("without-") {
                return Err(Error::malformed(
                    field,
                    format!("'{}' is not a with-/without- option", flag),
                ));
            }
            let when = when
                .as_deref()
                .map(Condition::parse)
                .transpose()
                .map_err(|e| Error::malformed(format!("{}.when", field), e.to_string()))?;
            forwarded.push(ForwardedOption { flag, when });
        }

        let dep = Dependency {
            name: dep_name,
            phase: entry.phase,
            condition,
            options: forwarded,
        };
        if dep.phase == Phase::Optional {
            options.entry(dep.implicit_option()).or_insert(OptionDecl {
                description: Some(format!("Build with {} support", dep.name)),
                default: false,
                implicit: true,
            });
        }
        dependencies.push(dep);
    }

    if file.install.is_empty() {
        return Err(Error::malformed(
            "install",
            "at least one install step is required",
        ));
    }

    let mut install_steps = Vec::with_capacity(file.install.len());
    for (i, entry) in file.install.into_iter().enumerate() {
        let field = format!("install[{}]", i);
        install_steps.push(build_step(entry, &field, &options, &variables, None)?);
    }

    let test_entry = file
        .test
        .ok_or_else(|| Error::malformed("test", "a post-install test step is required"))?;
    if test_entry.when.is_some() {
        return Err(Error::malformed(
            "test.when",
            "the test step cannot be guarded",
        ));
    }
    let test_step = build_step(test_entry, "test", &options, &variables, Some("test"))?;

    let artifacts = build_artifacts(file.artifacts)?;

    Ok(Manifest {
        name,
        homepage: file.package.homepage,
        head: file.package.head,
        summary: file.package.summary,
        license: file.package.license,
        source_url,
        checksum,
        version,
        options,
        dependencies,
        install_steps,
        artifacts,
        test_step,
        variables,
    })
}

fn build_step(
    entry: StepEntry,
    field: &str,
    options: &BTreeMap<String, OptionDecl>,
    variables: &BTreeMap<String, String>,
    default_name: Option<&str>,
) -> Result<Step> {
    let tool = entry.tool.trim().to_string();
    if tool.is_empty() {
        return Err(Error::malformed(
            format!("{}.tool", field),
            "must not be empty",
        ));
    }

    let when = entry
        .when
        .as_deref()
        .map(Condition::parse)
        .transpose()
        .map_err(|e| Error::malformed(format!("{}.when", field), e.to_string()))?;
    if let Some(cond) = &when {
        if let Some(unknown) = cond.options().into_iter().find(|o| !options.contains_key(*o)) {
            return Err(Error::malformed(
                format!("{}.when", field),
                format!("references undefined option '{}'", unknown),
            ));
        }
    }

    let templates = std::iter::once(("tool", tool.as_str()))
        .chain(entry.args.iter().map(|a| ("args", a.as_str())))
        .chain(entry.env.values().map(|v| ("env", v.as_str())));
    for (part, template) in templates {
        for var in template_variables(template) {
            if !BUILTIN_VARIABLES.contains(&var) && !variables.contains_key(var) {
                return Err(Error::malformed(
                    format!("{}.{}", field, part),
                    format!("references undefined variable '{}'", var),
                ));
            }
        }
    }

    let name = match entry.name.map(|n| n.trim().to_string()) {
        Some(n) if !n.is_empty() => n,
        _ => default_name
            .map(str::to_string)
            .unwrap_or_else(|| tool_name(&tool)),
    };

    Ok(Step {
        name,
        tool,
        args: entry.args,
        when,
        env: entry.env,
    })
}

fn build_artifacts(section: ArtifactSection) -> Result<Vec<Artifact>> {
    let groups = [
        (ArtifactKind::Bin, section.bin),
        (ArtifactKind::Lib, section.lib),
        (ArtifactKind::Include, section.include),
        (ArtifactKind::Share, section.share),
    ];

    let mut artifacts = Vec::new();
    for (kind, paths) in groups {
        for (i, path) in paths.into_iter().enumerate() {
            if !is_contained_path(&path) {
                return Err(Error::malformed(
                    format!("artifacts.{}[{}]", kind, i),
                    format!("'{}' must be a relative path inside the build tree", path),
                ));
            }
            artifacts.push(Artifact { kind, path });
        }
    }
    Ok(artifacts)
}

fn check_variables(variables: BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    for key in variables.keys() {
        if BUILTIN_VARIABLES.contains(&key.as_str()) {
            return Err(Error::malformed(
                format!("variables.{}", key),
                "shadows a built-in variable",
            ));
        }
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::malformed(
                format!("variables.{}", key),
                "variable names may only contain letters, digits and '_'",
            ));
        }
    }
    Ok(variables)
}

fn is_option_name(name: &str) -> bool {
    name.strip_prefix("with-").is_some_and(|rest| !rest.is_empty())
}

fn is_contained_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Last path segment of a tool, e.g. `%(bin)s/synth` -> `synth`
fn tool_name(tool: &str) -> String {
    tool.rsplit('/').next().unwrap_or(tool).to_string()
}

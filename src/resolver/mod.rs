// src/resolver/mod.rs

//! Dependency resolution against an option set
//!
//! Manifest dependencies are flat: transitive expansion belongs to the
//! package manager behind [`DependencyProvider`]. Resolution only decides
//! which declared dependencies apply for the given options, keeping
//! declaration order and dropping repeated names.

pub mod provider;

pub use provider::{DependencyProvider, NoopProvider, ProvideResult};

use crate::error::{Error, Result};
use crate::manifest::{Condition, Dependency, Manifest, Phase};
use crate::options::OptionSet;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// A dependency selected for this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub phase: Phase,
    /// Option flags forwarded to the provider
    pub options: Vec<String>,
}

/// Outcome of resolving a manifest's dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    dependencies: Vec<ResolvedDependency>,
    skipped: Vec<String>,
}

impl Resolution {
    /// Included dependencies in declaration order
    pub fn dependencies(&self) -> &[ResolvedDependency] {
        &self.dependencies
    }

    /// Dependencies only needed while building
    pub fn build_only(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter().filter(|d| d.phase == Phase::Build)
    }

    /// Dependencies the installed package needs (runtime and enabled optional)
    pub fn runtime(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter().filter(|d| d.phase != Phase::Build)
    }

    /// Names of declared dependencies left out by the option set
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn names(&self) -> Vec<&str> {
        self.dependencies.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }
}

/// Select the dependencies that apply under `options`
///
/// A condition naming an option absent from `options` makes the whole
/// resolution fail, regardless of phase. The same holds for the guard of a
/// forwarded option on an included dependency. An optional dependency without a
/// condition follows its implicit `with-<name>` option, which reads as
/// disabled when absent.
pub fn resolve(manifest: &Manifest, options: &OptionSet) -> Result<Resolution> {
    let mut resolution = Resolution::default();
    let mut seen = HashSet::new();

    for dep in manifest.dependencies() {
        if !is_included(dep, options)? {
            debug!(dependency = %dep.name, phase = %dep.phase, "skipping dependency");
            resolution.skipped.push(dep.name.clone());
            continue;
        }

        if !seen.insert(dep.name.as_str()) {
            continue;
        }

        let mut forwarded = Vec::with_capacity(dep.options.len());
        for option in &dep.options {
            let enabled = match &option.when {
                Some(cond) => evaluate(dep, cond, options)?,
                None => true,
            };
            if enabled {
                forwarded.push(option.flag.clone());
            }
        }

        debug!(dependency = %dep.name, phase = %dep.phase, ?forwarded, "including dependency");
        resolution.dependencies.push(ResolvedDependency {
            name: dep.name.clone(),
            phase: dep.phase,
            options: forwarded,
        });
    }

    Ok(resolution)
}

fn is_included(dep: &Dependency, options: &OptionSet) -> Result<bool> {
    match (&dep.condition, dep.phase) {
        (Some(cond), _) => evaluate(dep, cond, options),
        (None, Phase::Optional) => Ok(options.is_enabled(&dep.implicit_option())),
        (None, _) => Ok(true),
    }
}

fn evaluate(dep: &Dependency, cond: &Condition, options: &OptionSet) -> Result<bool> {
    cond.evaluate(options)
        .map_err(|unknown| Error::UnsatisfiableDependency {
            dependency: dep.name.clone(),
            reason: format!(
                "condition '{}' references unknown option '{}'",
                cond, unknown.0
            ),
        })
}

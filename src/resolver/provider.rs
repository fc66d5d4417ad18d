// src/resolver/provider.rs

//! Seam to the package manager that actually satisfies dependencies

use super::ResolvedDependency;
use crate::error::Result;
use serde::Serialize;

/// Installs resolved dependencies on behalf of the engine
///
/// The engine never installs packages itself. Implementations wrap the host
/// package manager; transitive dependencies are theirs to handle.
pub trait DependencyProvider: Send + Sync {
    /// Names of dependencies that are not currently installed
    fn check_missing(&self, deps: &[ResolvedDependency]) -> Result<Vec<String>>;

    /// Install the given dependencies, honouring their forwarded options
    ///
    /// Returns the names actually installed.
    fn install(&self, deps: &[ResolvedDependency]) -> Result<Vec<String>>;
}

/// A provider that assumes every dependency is already present
pub struct NoopProvider;

impl DependencyProvider for NoopProvider {
    fn check_missing(&self, _deps: &[ResolvedDependency]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn install(&self, _deps: &[ResolvedDependency]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// What the provider did for one install run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProvideResult {
    /// Dependencies that were already installed
    pub already_installed: Vec<String>,
    /// Dependencies installed for this run
    pub newly_installed: Vec<String>,
    /// Dependencies the provider could not install
    pub unresolved: Vec<String>,
}

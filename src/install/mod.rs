// src/install/mod.rs

//! The install pipeline
//!
//! Resolve -> provide dependencies -> prepare sources -> execute.
//! Each stage runs only if the previous one succeeded, so a manifest that
//! cannot be resolved never starts an external command.

mod config;

pub use config::InstallConfig;

use crate::error::{Error, Result};
use crate::executor::{
    BuildContext, CancelToken, CommandRunner, DryRunRunner, Executor, StepRecord, SystemRunner,
};
use crate::manifest::Manifest;
use crate::options::OptionSet;
use crate::resolver::{DependencyProvider, ProvideResult, Resolution, ResolvedDependency, resolve};
use crate::source::{self, SourceFetcher};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// What an install run did
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub prefix: PathBuf,
    pub dependencies: Vec<ResolvedDependency>,
    pub provided: ProvideResult,
    pub steps: Vec<StepRecord>,
    pub artifacts: Vec<PathBuf>,
    /// Build directory left on disk with `keep_builddir`
    pub build_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Runs the full pipeline for a manifest
pub struct Installer {
    config: InstallConfig,
    provider: Option<Arc<dyn DependencyProvider>>,
    runner: Option<Arc<dyn CommandRunner>>,
    progress: Option<ProgressBar>,
}

impl Installer {
    pub fn new(config: InstallConfig) -> Self {
        Self {
            config,
            provider: None,
            runner: None,
            progress: None,
        }
    }

    /// Use `provider` to check and install resolved dependencies
    pub fn with_provider(mut self, provider: Arc<dyn DependencyProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Run steps through `runner` instead of spawning processes directly
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Show source download progress on `progress`
    pub fn with_download_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// The option set a run actually uses
    pub fn effective_options(&self, manifest: &Manifest, options: &OptionSet) -> OptionSet {
        if self.config.seed_defaults {
            manifest.default_options().merged(options)
        } else {
            options.clone()
        }
    }

    /// Install `manifest` with `options`
    pub fn install(
        &self,
        manifest: &Manifest,
        options: &OptionSet,
        cancel: &CancelToken,
    ) -> Result<InstallReport> {
        info!("Installing {} {}", manifest.name(), manifest.version());

        for name in manifest.undeclared_options(options) {
            warn!("{} does not declare option '{}'", manifest.name(), name);
        }
        let options = self.effective_options(manifest, options);
        debug!(enabled = ?options.enabled(), "Effective options");

        let resolution = resolve(manifest, &options)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled { step: None });
        }

        let provided = self.provide(&resolution)?;
        if !provided.unresolved.is_empty() {
            return Err(Error::UnsatisfiableDependency {
                dependency: provided.unresolved.join(", "),
                reason: "not available from the package manager".to_string(),
            });
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled { step: None });
        }

        let prefix = self.config.prefix_for(manifest);
        let (source_dir, build_dir) = self.prepare_sources(manifest)?;

        let system = SystemRunner::new();
        let runner: &dyn CommandRunner = if self.config.dry_run {
            &DryRunRunner
        } else {
            match &self.runner {
                Some(runner) => runner.as_ref(),
                None => &system,
            }
        };

        let mut executor = Executor::new(
            manifest,
            &options,
            runner,
            BuildContext {
                source_dir,
                prefix: prefix.clone(),
            },
        );
        let outcome = executor.run(cancel);
        let kept = self.finish_build_dir(build_dir);
        let run = outcome?;

        Ok(InstallReport {
            name: manifest.name().to_string(),
            version: manifest.version().to_string(),
            prefix,
            dependencies: resolution.dependencies().to_vec(),
            provided,
            steps: run.records,
            artifacts: run.artifacts,
            build_dir: kept,
            dry_run: self.config.dry_run,
        })
    }

    /// Check resolved dependencies with the provider and install the missing ones
    pub fn provide(&self, resolution: &Resolution) -> Result<ProvideResult> {
        let deps = resolution.dependencies();
        let names: Vec<String> = deps.iter().map(|d| d.name.clone()).collect();

        if deps.is_empty() {
            debug!("No dependencies to provide");
            return Ok(ProvideResult::default());
        }

        info!("Checking dependencies: {}", names.join(", "));

        let provider = match &self.provider {
            Some(p) => p,
            None => {
                debug!("No dependency provider configured, assuming all dependencies are available");
                return Ok(ProvideResult {
                    already_installed: names,
                    ..Default::default()
                });
            }
        };

        let missing = provider.check_missing(deps)?;
        let missing_set: HashSet<&str> = missing.iter().map(|s| s.as_str()).collect();
        let already_installed: Vec<String> = names
            .iter()
            .filter(|n| !missing_set.contains(n.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            info!("All dependencies are already installed");
            return Ok(ProvideResult {
                already_installed,
                ..Default::default()
            });
        }

        if self.config.dry_run {
            info!("[dry-run] would install dependencies: {}", missing.join(", "));
            return Ok(ProvideResult {
                already_installed,
                ..Default::default()
            });
        }

        info!("Installing missing dependencies: {}", missing.join(", "));
        let to_install: Vec<ResolvedDependency> = deps
            .iter()
            .filter(|d| missing_set.contains(d.name.as_str()))
            .cloned()
            .collect();

        let newly_installed = provider.install(&to_install).map_err(|e| match e {
            Error::DependencyInstallFailed(_) => e,
            other => Error::DependencyInstallFailed(other.to_string()),
        })?;

        let installed_set: HashSet<&str> = newly_installed.iter().map(|s| s.as_str()).collect();
        let unresolved: Vec<String> = missing
            .iter()
            .filter(|m| !installed_set.contains(m.as_str()))
            .cloned()
            .collect();

        Ok(ProvideResult {
            already_installed,
            newly_installed,
            unresolved,
        })
    }

    /// Locate or create the source tree; the returned TempDir owns it
    fn prepare_sources(&self, manifest: &Manifest) -> Result<(PathBuf, Option<TempDir>)> {
        if let Some(dir) = &self.config.source_dir {
            if !dir.is_dir() {
                return Err(Error::FetchFailed(format!(
                    "source directory {} does not exist",
                    dir.display()
                )));
            }
            info!("Using local source tree {}", dir.display());
            return Ok((dir.clone(), None));
        }

        let Some(url) = manifest.source_url() else {
            return Err(Error::FetchFailed(format!(
                "{} declares no source URL and no source directory was given",
                manifest.name()
            )));
        };

        if self.config.dry_run {
            info!("[dry-run] would fetch {}", url);
            let placeholder = std::env::temp_dir()
                .join(format!("{}-{}", manifest.name(), manifest.version()));
            return Ok((placeholder, None));
        }

        let mut fetcher = SourceFetcher::new(&self.config.source_cache)?;
        if let Some(pb) = &self.progress {
            fetcher = fetcher.with_progress(pb.clone());
        }
        let archive = fetcher.fetch(manifest)?;

        let build_dir = tempfile::Builder::new()
            .prefix(&format!("formulary-{}-", manifest.name()))
            .tempdir()?;
        let root = source::unpack(
            &archive,
            manifest.archive_filename().as_deref(),
            build_dir.path(),
        )?;

        Ok((root, Some(build_dir)))
    }

    fn finish_build_dir(&self, build_dir: Option<TempDir>) -> Option<PathBuf> {
        let dir = build_dir?;
        if self.config.keep_builddir {
            let path = dir.into_path();
            info!("Build directory kept at {}", path.display());
            Some(path)
        } else {
            if let Err(e) = dir.close() {
                warn!("Failed to remove build directory: {}", e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Invocation, RunOutcome};
    use crate::manifest::parse_manifest;
    use std::sync::Mutex;

    struct RecordingRunner {
        programs: Mutex<Vec<String>>,
    }

    impl RecordingRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                programs: Mutex::new(Vec::new()),
            })
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation, _cancel: &CancelToken) -> Result<RunOutcome> {
            self.programs.lock().unwrap().push(invocation.program.clone());
            Ok(RunOutcome::Success)
        }
    }

    struct FixedProvider {
        missing: Vec<String>,
        installable: Vec<String>,
    }

    impl DependencyProvider for FixedProvider {
        fn check_missing(&self, deps: &[ResolvedDependency]) -> Result<Vec<String>> {
            Ok(deps
                .iter()
                .filter(|d| self.missing.contains(&d.name))
                .map(|d| d.name.clone())
                .collect())
        }

        fn install(&self, deps: &[ResolvedDependency]) -> Result<Vec<String>> {
            Ok(deps
                .iter()
                .filter(|d| self.installable.contains(&d.name))
                .map(|d| d.name.clone())
                .collect())
        }
    }

    const SYNTH: &str = r#"
[package]
name = "synth"
version = "0.52.0"

[[dependencies]]
name = "scons"
phase = "build"

[[dependencies]]
name = "python"
phase = "optional"
condition = "with-python"

[[install]]
tool = "scons"
args = ["synth"]

[[install]]
tool = "python"
args = ["setup.py", "install", "--prefix=%(prefix)s"]
when = "with-python"

[test]
tool = "synth"
args = ["--version"]
"#;

    fn config(dir: &TempDir) -> InstallConfig {
        InstallConfig {
            prefix: Some(dir.path().join("prefix")),
            source_dir: Some(dir.path().to_path_buf()),
            source_cache: dir.path().join("cache"),
            ..Default::default()
        }
    }

    #[test]
    fn test_install_with_defaults_seeded() {
        let dir = TempDir::new().unwrap();
        let manifest = parse_manifest(SYNTH).unwrap();
        let runner = RecordingRunner::new();
        let installer = Installer::new(config(&dir)).with_runner(runner.clone());

        let report = installer
            .install(&manifest, &OptionSet::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(*runner.programs.lock().unwrap(), vec!["scons", "synth"]);
        assert_eq!(report.dependencies.len(), 1);
        assert_eq!(report.provided.already_installed, vec!["scons"]);
        assert_eq!(report.prefix, dir.path().join("prefix"));
    }

    #[test]
    fn test_unseeded_options_must_be_complete() {
        let dir = TempDir::new().unwrap();
        let manifest = parse_manifest(SYNTH).unwrap();
        let runner = RecordingRunner::new();
        let installer = Installer::new(InstallConfig {
            seed_defaults: false,
            ..config(&dir)
        })
        .with_runner(runner.clone());

        let err = installer
            .install(&manifest, &OptionSet::new(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), "UnsatisfiableDependency");
        assert!(runner.programs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_provider_installs_missing() {
        let dir = TempDir::new().unwrap();
        let manifest = parse_manifest(SYNTH).unwrap();
        let provider = Arc::new(FixedProvider {
            missing: vec!["python".to_string()],
            installable: vec!["python".to_string()],
        });
        let installer = Installer::new(config(&dir))
            .with_runner(RecordingRunner::new())
            .with_provider(provider);

        let options = OptionSet::from_flags(["--with-python"]).unwrap();
        let report = installer
            .install(&manifest, &options, &CancelToken::new())
            .unwrap();

        assert_eq!(report.provided.already_installed, vec!["scons"]);
        assert_eq!(report.provided.newly_installed, vec!["python"]);
    }

    #[test]
    fn test_unresolved_dependency_aborts() {
        let dir = TempDir::new().unwrap();
        let manifest = parse_manifest(SYNTH).unwrap();
        let runner = RecordingRunner::new();
        let installer = Installer::new(config(&dir))
            .with_runner(runner.clone())
            .with_provider(Arc::new(FixedProvider {
                missing: vec!["scons".to_string()],
                installable: Vec::new(),
            }));

        let err = installer
            .install(&manifest, &OptionSet::new(), &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::UnsatisfiableDependency { ref dependency, .. } if dependency == "scons"));
        assert!(runner.programs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_skips_runner_and_provider_install() {
        let dir = TempDir::new().unwrap();
        let manifest = parse_manifest(SYNTH).unwrap();
        let runner = RecordingRunner::new();
        let installer = Installer::new(InstallConfig {
            dry_run: true,
            ..config(&dir)
        })
        .with_runner(runner.clone())
        .with_provider(Arc::new(FixedProvider {
            missing: vec!["scons".to_string()],
            installable: Vec::new(),
        }));

        let report = installer
            .install(&manifest, &OptionSet::new(), &CancelToken::new())
            .unwrap();

        assert!(report.dry_run);
        assert!(runner.programs.lock().unwrap().is_empty());
        assert!(!dir.path().join("prefix").exists());
    }

    #[test]
    fn test_missing_source_dir() {
        let dir = TempDir::new().unwrap();
        let manifest = parse_manifest(SYNTH).unwrap();
        let installer = Installer::new(InstallConfig {
            source_dir: Some(dir.path().join("nope")),
            ..config(&dir)
        });

        let err = installer
            .install(&manifest, &OptionSet::new(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), "FetchFailed");
    }
}

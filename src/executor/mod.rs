// src/executor/mod.rs

//! Recipe execution: install steps, artifacts, then the test step
//!
//! Each step moves through a small state machine:
//!
//! ```text
//! Pending -> Running -> Succeeded
//!                    -> Failed
//! Pending -> Skipped            (guard evaluated false)
//! ```
//!
//! The first failed install step stops the run. Nothing is rolled back:
//! whatever the external tools already wrote stays on disk.

pub mod cancel;
pub mod runner;

pub use cancel::CancelToken;
pub use runner::{CommandRunner, DryRunRunner, Invocation, RunOutcome, SystemRunner};

use crate::error::{Error, Result};
use crate::manifest::{Artifact, ArtifactKind, Manifest, Step};
use crate::options::OptionSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lifecycle state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// State of one step after (or during) a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub state: StepState,
    /// Exit status, when the process exited normally
    pub status: Option<i32>,
    /// Whether this is the post-install test step
    pub is_test: bool,
}

/// Where a run takes place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Unpacked source tree; steps run here
    pub source_dir: PathBuf,
    /// Install prefix
    pub prefix: PathBuf,
}

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub records: Vec<StepRecord>,
    /// Destination paths of copied artifacts
    pub artifacts: Vec<PathBuf>,
    pub prefix: PathBuf,
}

impl RunReport {
    /// Names of steps that ran to completion, in order
    pub fn succeeded(&self) -> Vec<&str> {
        self.names_in(StepState::Succeeded)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_in(StepState::Skipped)
    }

    fn names_in(&self, state: StepState) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.state == state)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Runs one manifest's recipe
pub struct Executor<'a> {
    manifest: &'a Manifest,
    /// Declared defaults overlaid with the caller's options
    options: OptionSet,
    runner: &'a dyn CommandRunner,
    context: BuildContext,
    records: Vec<StepRecord>,
}

impl<'a> Executor<'a> {
    pub fn new(
        manifest: &'a Manifest,
        options: &OptionSet,
        runner: &'a dyn CommandRunner,
        context: BuildContext,
    ) -> Self {
        let mut records: Vec<StepRecord> = manifest
            .install_steps()
            .iter()
            .map(|s| StepRecord {
                name: s.name.clone(),
                state: StepState::Pending,
                status: None,
                is_test: false,
            })
            .collect();
        records.push(StepRecord {
            name: manifest.test_step().name.clone(),
            state: StepState::Pending,
            status: None,
            is_test: true,
        });

        Self {
            manifest,
            options: manifest.default_options().merged(options),
            runner,
            context,
            records,
        }
    }

    /// Step states so far; valid after success or failure
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run install steps, copy artifacts, then run the test step
    pub fn run(&mut self, cancel: &CancelToken) -> Result<RunReport> {
        let manifest = self.manifest;
        info!(
            "Building {} {} into {}",
            manifest.name(),
            manifest.version(),
            self.context.prefix.display()
        );

        let vars = manifest.variables(&self.context.prefix, &self.context.source_dir);
        if !self.runner.is_dry_run() {
            fs::create_dir_all(&self.context.prefix)?;
        }

        for (index, step) in manifest.install_steps().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { step: None });
            }

            if !self.guard_allows(step)? {
                info!("Skipping step '{}' (guard: {})", step.name, describe_guard(step));
                self.records[index].state = StepState::Skipped;
                continue;
            }

            match self.dispatch(index, step, &vars, cancel)? {
                RunOutcome::Success => {}
                RunOutcome::Failed { status } => {
                    return Err(Error::StepFailed {
                        step: step.name.clone(),
                        status,
                    });
                }
                RunOutcome::Cancelled => {
                    return Err(Error::Cancelled {
                        step: Some(step.name.clone()),
                    });
                }
            }
        }

        let artifacts = self.install_artifacts()?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled { step: None });
        }

        let test = manifest.test_step();
        let test_index = self.records.len() - 1;
        info!("Verifying install with '{}'", test.name);
        match self.dispatch(test_index, test, &vars, cancel)? {
            RunOutcome::Success => {}
            RunOutcome::Failed { status } => {
                return Err(Error::PostInstallVerificationFailed {
                    step: test.name.clone(),
                    status,
                });
            }
            RunOutcome::Cancelled => {
                return Err(Error::Cancelled {
                    step: Some(test.name.clone()),
                });
            }
        }

        info!("{} {} installed", manifest.name(), manifest.version());
        Ok(RunReport {
            records: self.records.clone(),
            artifacts,
            prefix: self.context.prefix.clone(),
        })
    }

    fn guard_allows(&self, step: &Step) -> Result<bool> {
        step.is_enabled(&self.options).map_err(|unknown| {
            Error::malformed(
                format!("{}.when", step.name),
                format!("references undefined option '{}'", unknown.0),
            )
        })
    }

    fn dispatch(
        &mut self,
        index: usize,
        step: &Step,
        vars: &BTreeMap<String, String>,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        let (program, args) = step.command_line(vars);
        let invocation = Invocation {
            step: step.name.clone(),
            program,
            args,
            workdir: self.context.source_dir.clone(),
            env: step
                .env
                .iter()
                .map(|(k, v)| (k.clone(), crate::manifest::substitute(v, vars)))
                .collect(),
        };

        info!("Running step '{}'", step.name);
        self.records[index].state = StepState::Running;

        let outcome = match self.runner.run(&invocation, cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.records[index].state = StepState::Failed;
                return Err(e);
            }
        };

        let record = &mut self.records[index];
        match outcome {
            RunOutcome::Success => {
                record.state = StepState::Succeeded;
                record.status = Some(0);
            }
            RunOutcome::Failed { status } => {
                record.state = StepState::Failed;
                record.status = status;
            }
            RunOutcome::Cancelled => record.state = StepState::Failed,
        }
        debug!(step = %record.name, state = %record.state, "Step finished");

        Ok(outcome)
    }

    fn install_artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut installed = Vec::with_capacity(self.manifest.artifacts().len());
        for artifact in self.manifest.artifacts() {
            let dest = self.artifact_destination(artifact);
            if self.runner.is_dry_run() {
                info!("[dry-run] install {} -> {}", artifact.path, dest.display());
            } else {
                self.install_artifact(artifact, &dest)?;
                info!("Installed {}", dest.display());
            }
            installed.push(dest);
        }
        Ok(installed)
    }

    fn artifact_destination(&self, artifact: &Artifact) -> PathBuf {
        let file_name = Path::new(&artifact.path)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&artifact.path));
        artifact.kind.dir(&self.context.prefix).join(file_name)
    }

    fn install_artifact(&self, artifact: &Artifact, dest: &Path) -> Result<()> {
        let src = self.context.source_dir.join(&artifact.path);
        if !src.exists() {
            return Err(Error::ArtifactMissing {
                path: artifact.path.clone(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if src.is_dir() {
            copy_tree(&src, dest)?;
        } else {
            fs::copy(&src, dest)?;
            if artifact.kind == ArtifactKind::Bin {
                make_executable(dest)?;
            }
        }
        Ok(())
    }
}

fn describe_guard(step: &Step) -> String {
    step.when
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_default()
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

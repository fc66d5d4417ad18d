// src/commands/install.rs

//! Install command - resolve, build and install a manifest

use anyhow::{Context, Result};
use formulary::executor::{CancelToken, StepState};
use formulary::install::{InstallConfig, Installer};
use formulary::options::OptionSet;
use tracing::info;

pub fn cmd_install(
    manifest_path: &str,
    flags: &[String],
    config: InstallConfig,
    cancel: &CancelToken,
    json: bool,
) -> Result<()> {
    let manifest = super::load_manifest(manifest_path)?;
    let options = OptionSet::from_flags(flags)?;

    // Keep stdout clean for the JSON report
    if !json {
        println!("Manifest: {} version {}", manifest.name(), manifest.version());
        if config.dry_run {
            println!("[DRY RUN] No commands will be executed");
        }
    }

    let mut installer = Installer::new(config);
    if !installer.config().dry_run && installer.config().source_dir.is_none() {
        if let Some(pb) = super::download_progress(manifest.name()) {
            installer = installer.with_download_progress(pb);
        }
    }

    let report = installer
        .install(&manifest, &options, cancel)
        .with_context(|| format!("Failed to install {}", manifest.name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.dependencies.is_empty() {
        println!("\nDependencies:");
        for dep in &report.dependencies {
            println!("  - {} ({})", dep.name, dep.phase);
        }
    }

    println!("\nSteps:");
    for step in &report.steps {
        let marker = match step.state {
            StepState::Succeeded => "[OK]",
            StepState::Skipped => "[SKIP]",
            _ => "[--]",
        };
        let label = if step.is_test { " (test)" } else { "" };
        println!("  {} {}{}", marker, step.name, label);
    }

    if report.dry_run {
        println!("\n[DRY RUN] Would install {} {} to {}", report.name, report.version, report.prefix.display());
    } else {
        println!("\n[COMPLETE] Installed {} {} to {}", report.name, report.version, report.prefix.display());
    }
    if let Some(dir) = &report.build_dir {
        println!("  Build directory kept at {}", dir.display());
    }

    info!("Successfully installed {} to {}", report.name, report.prefix.display());
    Ok(())
}

// src/commands/mod.rs
//! Command handlers for the formulary CLI

mod check;
mod deps;
mod fetch;
mod install;

pub use check::cmd_check;
pub use deps::cmd_deps;
pub use fetch::cmd_fetch;
pub use install::cmd_install;

use anyhow::{Context, Result};
use formulary::manifest::{Manifest, parse_manifest_file, validate_manifest};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::Path;

/// Parse a manifest and print its validation warnings
fn load_manifest(path: &str) -> Result<Manifest> {
    let path = Path::new(path);
    let manifest = parse_manifest_file(path)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;

    for warning in validate_manifest(&manifest) {
        eprintln!("Warning: {}", warning);
    }

    Ok(manifest)
}

/// Byte progress bar for source downloads, when stderr is a terminal
fn download_progress(name: &str) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/dim}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .expect("Invalid progress bar template")
            .progress_chars("##-"),
    );
    pb.set_message(format!("Fetching {}", name));
    Some(pb)
}

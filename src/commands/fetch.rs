// src/commands/fetch.rs

//! Fetch command - download and verify sources without building

use anyhow::{Context, Result};
use formulary::install::InstallConfig;
use formulary::source::SourceFetcher;
use std::path::PathBuf;

pub fn cmd_fetch(manifest_path: &str, source_cache: Option<&str>) -> Result<()> {
    let manifest = super::load_manifest(manifest_path)?;

    let cache = source_cache
        .map(PathBuf::from)
        .unwrap_or_else(|| InstallConfig::default().source_cache);

    let mut fetcher = SourceFetcher::new(cache)?;
    if let Some(pb) = super::download_progress(manifest.name()) {
        fetcher = fetcher.with_progress(pb);
    }

    println!("Fetching sources for {} {}...", manifest.name(), manifest.version());
    let path = fetcher
        .fetch(&manifest)
        .with_context(|| format!("Failed to fetch sources for {}", manifest.name()))?;

    println!("\n[COMPLETE] Fetched and verified:");
    println!("  - {}", path.display());
    Ok(())
}

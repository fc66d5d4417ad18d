// src/commands/deps.rs

//! Deps command - show the resolved dependency set

use anyhow::{Context, Result};
use formulary::options::OptionSet;
use formulary::resolver::resolve;

pub fn cmd_deps(manifest_path: &str, flags: &[String], seed_defaults: bool, json: bool) -> Result<()> {
    let manifest = super::load_manifest(manifest_path)?;

    let requested = OptionSet::from_flags(flags)?;
    for name in manifest.undeclared_options(&requested) {
        eprintln!("Warning: {} does not declare option '{}'", manifest.name(), name);
    }
    let options = if seed_defaults {
        manifest.default_options().merged(&requested)
    } else {
        requested
    };

    let resolution = resolve(&manifest, &options)
        .with_context(|| format!("Failed to resolve dependencies for {}", manifest.name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    println!("{} {}", manifest.name(), manifest.version());
    let enabled = options.enabled();
    if !enabled.is_empty() {
        println!("  Enabled options: {}", enabled.join(", "));
    }

    if resolution.is_empty() {
        println!("  No dependencies");
    }
    for dep in resolution.dependencies() {
        if dep.options.is_empty() {
            println!("  {} ({})", dep.name, dep.phase);
        } else {
            println!("  {} ({}) [{}]", dep.name, dep.phase, dep.options.join(", "));
        }
    }
    for name in resolution.skipped() {
        println!("  {} (skipped)", name);
    }

    Ok(())
}

// src/commands/check.rs

//! Check command - parse and validate a manifest

use anyhow::Result;
use formulary::manifest::Phase;

pub fn cmd_check(manifest_path: &str) -> Result<()> {
    println!("Reading manifest: {}", manifest_path);
    let manifest = super::load_manifest(manifest_path)?;

    println!("Manifest: {} version {}", manifest.name(), manifest.version());
    if let Some(url) = manifest.source_url() {
        println!("  Source: {}", url);
    }

    let count = |phase: Phase| {
        manifest
            .dependencies()
            .iter()
            .filter(|d| d.phase == phase)
            .count()
    };
    println!(
        "  Dependencies: {} build, {} runtime, {} optional",
        count(Phase::Build),
        count(Phase::Runtime),
        count(Phase::Optional)
    );
    println!("  Install steps: {}", manifest.install_steps().len());

    if !manifest.options().is_empty() {
        println!("  Options:");
        for (name, decl) in manifest.options() {
            let default = if decl.default { "on" } else { "off" };
            match &decl.description {
                Some(desc) => println!("    --{:<20} {} (default {})", name, desc, default),
                None => println!("    --{:<20} (default {})", name, default),
            }
        }
    }

    println!("[OK] Manifest is valid");
    Ok(())
}

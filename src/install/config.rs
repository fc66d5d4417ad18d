// src/install/config.rs

//! Configuration for install runs

use crate::manifest::Manifest;
use std::path::PathBuf;

/// Where and how a manifest is installed
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Root under which packages get `<name>/<version>` prefixes
    pub prefix_root: PathBuf,
    /// Exact prefix, overriding `prefix_root`
    pub prefix: Option<PathBuf>,
    /// Directory for downloaded source archives
    pub source_cache: PathBuf,
    /// Existing source tree to build from instead of fetching
    pub source_dir: Option<PathBuf>,
    /// Keep the unpacked build directory after the run (for debugging)
    pub keep_builddir: bool,
    /// Log what would run without running it
    pub dry_run: bool,
    /// Start from the manifest's declared option defaults
    ///
    /// When false, the caller's option set must name every option a
    /// dependency condition references.
    pub seed_defaults: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        let cache_root = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);

        Self {
            prefix_root: PathBuf::from("/usr/local/Cellar"),
            prefix: None,
            source_cache: cache_root.join("formulary").join("sources"),
            source_dir: None,
            keep_builddir: false,
            dry_run: false,
            seed_defaults: true,
        }
    }
}

impl InstallConfig {
    /// Install prefix for `manifest`
    pub fn prefix_for(&self, manifest: &Manifest) -> PathBuf {
        match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => self
                .prefix_root
                .join(manifest.name())
                .join(manifest.version().as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;

    fn synth() -> Manifest {
        parse_manifest(
            r#"
[package]
name = "synth"
version = "0.52.0"

[[install]]
tool = "scons"

[test]
tool = "synth"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = InstallConfig::default();
        assert_eq!(config.prefix_root, PathBuf::from("/usr/local/Cellar"));
        assert!(config.source_cache.ends_with("formulary/sources"));
        assert!(config.seed_defaults);
        assert!(!config.dry_run);
        assert!(!config.keep_builddir);
    }

    #[test]
    fn test_prefix_for() {
        let mut config = InstallConfig::default();
        assert_eq!(
            config.prefix_for(&synth()),
            PathBuf::from("/usr/local/Cellar/synth/0.52.0")
        );

        config.prefix = Some(PathBuf::from("/opt/synth"));
        assert_eq!(config.prefix_for(&synth()), PathBuf::from("/opt/synth"));
    }
}

// src/options.rs

//! Caller-supplied option flags
//!
//! An [`OptionSet`] maps option names (always `with-<feature>`) to their
//! state. It is built before resolution and never changes during a run.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// A command-line flag that is not `--with-X` or `--without-X`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized option flag '{0}' (expected --with-<name> or --without-<name>)")]
pub struct InvalidFlag(pub String);

/// Option name to enabled state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OptionSet {
    flags: BTreeMap<String, bool>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `--with-X` / `--without-X` flags; later flags win
    pub fn from_flags<I, S>(flags: I) -> Result<Self, InvalidFlag>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for flag in flags {
            let (name, value) = parse_flag(flag.as_ref())?;
            set.set(name, value);
        }
        Ok(set)
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.flags.insert(name.into(), enabled);
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Enabled state; unknown options read as disabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).unwrap_or(false)
    }

    /// Layer `overrides` on top of this set
    pub fn merged(mut self, overrides: &OptionSet) -> Self {
        for (name, value) in &overrides.flags {
            self.flags.insert(name.clone(), *value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Names of enabled options, sorted
    pub fn enabled(&self) -> Vec<&str> {
        self.iter().filter(|(_, v)| *v).map(|(k, _)| k).collect()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

fn parse_flag(flag: &str) -> Result<(String, bool), InvalidFlag> {
    let body = flag
        .strip_prefix("--")
        .ok_or_else(|| InvalidFlag(flag.to_string()))?;

    if let Some(name) = body.strip_prefix("without-") {
        if is_feature_name(name) {
            return Ok((format!("with-{}", name), false));
        }
    } else if let Some(name) = body.strip_prefix("with-") {
        if is_feature_name(name) {
            return Ok((body.to_string(), true));
        }
    }

    Err(InvalidFlag(flag.to_string()))
}

/// Same character set condition expressions accept
fn is_feature_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        let set = OptionSet::from_flags(["--with-python", "--without-docs"]).unwrap();
        assert_eq!(set.get("with-python"), Some(true));
        assert_eq!(set.get("with-docs"), Some(false));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_later_flag_wins() {
        let set = OptionSet::from_flags(["--with-python", "--without-python"]).unwrap();
        assert_eq!(set.get("with-python"), Some(false));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_invalid_flags() {
        for flag in [
            "python",
            "--python",
            "--with-",
            "--without-",
            "-with-python",
            "--with-python=true",
            "--without-python=1",
            "--with-py thon",
        ] {
            assert_eq!(
                OptionSet::from_flags([flag]),
                Err(InvalidFlag(flag.to_string())),
                "flag {flag} should be rejected"
            );
        }
    }

    #[test]
    fn test_feature_name_characters() {
        let set = OptionSet::from_flags(["--with-c++11", "--with-gtk_3", "--without-x.org"]).unwrap();
        assert!(set.is_enabled("with-c++11"));
        assert!(set.is_enabled("with-gtk_3"));
        assert_eq!(set.get("with-x.org"), Some(false));
    }

    #[test]
    fn test_merged_overrides() {
        let mut defaults = OptionSet::new();
        defaults.set("with-python", false);
        defaults.set("with-docs", true);

        let cli = OptionSet::from_flags(["--with-python"]).unwrap();
        let merged = defaults.merged(&cli);

        assert_eq!(merged.get("with-python"), Some(true));
        assert_eq!(merged.get("with-docs"), Some(true));
        assert_eq!(merged.enabled(), vec!["with-docs", "with-python"]);
    }

    #[test]
    fn test_unknown_reads_disabled() {
        let set = OptionSet::new();
        assert!(!set.is_enabled("with-anything"));
        assert!(!set.contains("with-anything"));
        assert!(set.is_empty());
    }
}

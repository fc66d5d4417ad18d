// src/manifest/version.rs

//! Package versions
//!
//! Upstream versions are not always semver (`0.52`, `v1.2`), so they are
//! normalized into a [`semver::Version`] for ordering while the declared
//! text is kept for display and substitution.

use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Archive suffixes stripped before looking for a version in a file name
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".tar.zst", ".tar", ".zip",
];

static TRAILING_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9A-Za-z])v?(\d+(?:\.\d+)*(?:-(?:rc|alpha|beta|pre)\.?\d*)?)$")
        .expect("static regex")
});

/// An ordered package version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    raw: String,
    semver: Version,
}

impl PackageVersion {
    /// Parse a declared version, accepting one to three numeric components
    /// and an optional leading `v`
    pub fn parse(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        let raw = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if raw.is_empty() {
            return Err("version is empty".to_string());
        }

        if let Ok(semver) = Version::parse(raw) {
            return Ok(Self {
                raw: raw.to_string(),
                semver,
            });
        }

        let (core, pre) = match raw.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (raw, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(format!("'{}' has more than three numeric components", s));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("'{}' is not a numeric version", s))?;
        }

        let mut semver = Version::new(numbers[0], numbers[1], numbers[2]);
        if let Some(pre) = pre {
            semver.pre = semver::Prerelease::new(pre)
                .map_err(|e| format!("invalid pre-release in '{}': {}", s, e))?;
        }

        Ok(Self {
            raw: raw.to_string(),
            semver,
        })
    }

    /// Derive a version from the source archive file name
    ///
    /// `https://github.com/ajg/synth/archive/v0.52.0.tar.gz` yields `0.52.0`.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.trim_end_matches('/').rsplit('/').next()?;

        let stem = ARCHIVE_SUFFIXES
            .iter()
            .find_map(|suffix| file.strip_suffix(suffix))
            .unwrap_or(file);

        let captures = TRAILING_VERSION.captures(stem)?;
        Self::parse(captures.get(1)?.as_str()).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn semver(&self) -> &Version {
        &self.semver
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semver
            .cmp(&other.semver)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

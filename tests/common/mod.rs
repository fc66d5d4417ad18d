// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use formulary::executor::{CancelToken, CommandRunner, Invocation, RunOutcome};
use formulary::hash::{HashAlgorithm, hash_file};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// The synth formula: scons at build time, python bindings behind an option
pub const SYNTH: &str = r#"
[package]
name = "synth"
homepage = "https://github.com/ajg/synth"
summary = "Framework-agnostic template engine"
license = "BSL-1.0"

[source]
url = "https://github.com/ajg/synth/archive/v0.52.0.tar.gz"
checksum = "sha256:9a2f8b8c0d6f4e1a7b3c5d9e2f0a1b4c6d8e0f2a3b5c7d9e1f3a5b7c9d0e2f4a"

[[dependencies]]
name = "scons"
phase = "build"

[[dependencies]]
name = "boost"
phase = "runtime"
options = [{ flag = "with-python", when = "with-python" }]

[[dependencies]]
name = "python"
phase = "optional"
condition = "with-python"

[[install]]
tool = "scons"
args = ["synth", "debug=0", "boost=system"]

[[install]]
name = "python-bindings"
tool = "python"
args = ["setup.py", "install", "--prefix=%(prefix)s"]
when = "with-python"

[test]
tool = "%(bin)s/synth"
args = ["--version"]
"#;

/// Runner that records every invocation and answers from a script
///
/// Programs are matched by full name first, then by file name. Anything
/// not listed succeeds.
pub struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    outcomes: BTreeMap<String, RunOutcome>,
}

impl ScriptedRunner {
    pub fn succeeding() -> Self {
        Self::new(&[])
    }

    pub fn new(outcomes: &[(&str, RunOutcome)]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcomes: outcomes
                .iter()
                .map(|(program, outcome)| (program.to_string(), *outcome))
                .collect(),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.step).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        invocation: &Invocation,
        _cancel: &CancelToken,
    ) -> formulary::Result<RunOutcome> {
        self.calls.lock().unwrap().push(invocation.clone());
        let file_name = Path::new(&invocation.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&invocation.program);
        Ok(self
            .outcomes
            .get(&invocation.program)
            .or_else(|| self.outcomes.get(file_name))
            .copied()
            .unwrap_or(RunOutcome::Success))
    }
}

/// Write `text` to `<dir>/<name>.toml` and return the path
pub fn write_manifest(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(format!("{}.toml", name));
    fs::write(&path, text).unwrap();
    path
}

/// Build `<dir>/<top>.tar.gz` holding `files` under a `<top>/` directory
///
/// Returns the archive path and its prefixed sha256 checksum.
pub fn make_source_tarball(
    dir: &Path,
    top: &str,
    files: &[(&str, &[u8], u32)],
) -> (PathBuf, String) {
    let path = dir.join(format!("{}.tar.gz", top));
    let file = fs::File::create(&path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, data, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", top, name), *data)
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();

    let checksum = hash_file(HashAlgorithm::Sha256, &path).unwrap();
    (path, checksum.to_prefixed_string())
}

/// Scratch directory with an empty source tree and a prefix path
pub struct Workspace {
    pub dir: TempDir,
    pub source_dir: PathBuf,
    pub prefix: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("src");
        fs::create_dir_all(&source_dir).unwrap();
        let prefix = dir.path().join("prefix");
        Self {
            dir,
            source_dir,
            prefix,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

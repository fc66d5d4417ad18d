// src/lib.rs

//! Formulary: declarative package formulas
//!
//! A formula (manifest) describes how to build one version of one package.
//! Installing it is a strictly sequential pipeline:
//!
//! - [`manifest`]: parse and validate TOML manifests
//! - [`resolver`]: pick the dependencies that apply to an [`OptionSet`]
//! - [`source`]: fetch, verify and unpack the source archive
//! - [`executor`]: run guarded install steps, copy artifacts, run the test step
//! - [`install`]: the pipeline tying the stages together
//!
//! Transitive dependencies and the build tools themselves are external:
//! the engine only orders and invokes them.

mod error;
pub mod executor;
pub mod hash;
pub mod install;
pub mod manifest;
pub mod options;
pub mod resolver;
pub mod source;

pub use error::{Error, Result};
pub use executor::{CancelToken, CommandRunner, Executor, StepState};
pub use hash::{Hash, HashAlgorithm};
pub use install::{InstallConfig, InstallReport, Installer};
pub use manifest::{Manifest, parse_manifest, parse_manifest_file};
pub use options::OptionSet;
pub use resolver::{DependencyProvider, Resolution, resolve};

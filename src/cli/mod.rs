// src/cli/mod.rs
//! CLI definitions for formulary
//!
//! Command implementations live in the `commands` module.
//!
//! Option flags (`--with-<feature>`, `--without-<feature>`) are open-ended,
//! so they are split out of the argument list before clap sees it; see
//! [`split_option_flags`].

use clap::{ArgAction, Parser, Subcommand};
use std::ffi::OsString;

const OPTION_FLAGS_HELP: &str = "\
Option flags:
  --with-<feature>     Enable an option declared by the manifest
  --without-<feature>  Disable it
Option flags are accepted by `install` and `deps` and may appear anywhere
on the command line.";

#[derive(Parser)]
#[command(name = "formulary")]
#[command(author = "Formulary Contributors")]
#[command(version)]
#[command(about = "Resolve and run declarative package formulas", long_about = None)]
#[command(after_help = OPTION_FLAGS_HELP)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and install a package from its manifest
    Install {
        /// Path to the manifest file
        manifest: String,

        /// Install prefix (default: <prefix-root>/<name>/<version>)
        #[arg(long)]
        prefix: Option<String>,

        /// Root directory for versioned prefixes
        #[arg(long, default_value = "/usr/local/Cellar")]
        prefix_root: String,

        /// Build from this source tree instead of fetching the archive
        #[arg(long)]
        source_dir: Option<String>,

        /// Directory for cached source archives
        #[arg(long)]
        source_cache: Option<String>,

        /// Keep the build directory after completion
        #[arg(long)]
        keep_builddir: bool,

        /// Show what would run without running it
        #[arg(long)]
        dry_run: bool,

        /// Do not seed options with the manifest's declared defaults
        #[arg(long)]
        no_defaults: bool,

        /// Print the install report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a manifest
    Check {
        /// Path to the manifest file
        manifest: String,
    },

    /// Show the dependencies selected for an option set
    Deps {
        /// Path to the manifest file
        manifest: String,

        /// Do not seed options with the manifest's declared defaults
        #[arg(long)]
        no_defaults: bool,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download and verify the source archive only
    Fetch {
        /// Path to the manifest file
        manifest: String,

        /// Directory for cached source archives
        #[arg(long)]
        source_cache: Option<String>,
    },
}

/// Separate `--with-X` / `--without-X` flags from the rest of the arguments
///
/// Arguments after a literal `--` are left alone. The program name is kept.
pub fn split_option_flags<I>(args: I) -> (Vec<OsString>, Vec<String>)
where
    I: IntoIterator<Item = OsString>,
{
    let mut rest = Vec::new();
    let mut flags = Vec::new();
    let mut passthrough = false;

    for arg in args {
        if !passthrough {
            if arg == "--" {
                passthrough = true;
            } else if let Some(text) = arg.to_str() {
                if text.starts_with("--with-") || text.starts_with("--without-") {
                    flags.push(text.to_string());
                    continue;
                }
            }
        }
        rest.push(arg);
    }

    (rest, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_split_option_flags() {
        let (rest, flags) = split_option_flags(os(&[
            "formulary",
            "install",
            "--with-python",
            "synth.toml",
            "--prefix",
            "/opt/synth",
            "--without-docs",
        ]));
        assert_eq!(rest, os(&["formulary", "install", "synth.toml", "--prefix", "/opt/synth"]));
        assert_eq!(flags, vec!["--with-python", "--without-docs"]);
    }

    #[test]
    fn test_split_stops_at_double_dash() {
        let (rest, flags) = split_option_flags(os(&["formulary", "check", "--", "--with-python"]));
        assert_eq!(rest, os(&["formulary", "check", "--", "--with-python"]));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from(["formulary", "-v", "install", "synth.toml", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Some(Commands::Install {
                manifest,
                dry_run,
                prefix_root,
                ..
            }) => {
                assert_eq!(manifest, "synth.toml");
                assert!(dry_run);
                assert_eq!(prefix_root, "/usr/local/Cellar");
            }
            _ => panic!("expected install"),
        }
    }
}

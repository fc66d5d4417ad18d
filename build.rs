// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: manifest path
fn manifest_arg() -> Arg {
    Arg::new("manifest")
        .required(true)
        .value_name("MANIFEST")
        .help("Path to the manifest file")
}

/// Common argument: source archive cache
fn source_cache_arg() -> Arg {
    Arg::new("source_cache")
        .long("source-cache")
        .value_name("DIR")
        .help("Directory for cached source archives")
}

fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("formulary")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Formulary Contributors")
        .about("Resolve and run declarative package formulas")
        .after_help(
            "Option flags --with-<feature> and --without-<feature> are accepted by \
             install and deps and may appear anywhere on the command line.",
        )
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only log warnings and errors"),
        )
        .subcommand(
            Command::new("install")
                .about("Build and install a package from its manifest")
                .arg(manifest_arg())
                .arg(
                    Arg::new("prefix")
                        .long("prefix")
                        .value_name("DIR")
                        .help("Install prefix (default: <prefix-root>/<name>/<version>)"),
                )
                .arg(
                    Arg::new("prefix_root")
                        .long("prefix-root")
                        .value_name("DIR")
                        .default_value("/usr/local/Cellar")
                        .help("Root directory for versioned prefixes"),
                )
                .arg(
                    Arg::new("source_dir")
                        .long("source-dir")
                        .value_name("DIR")
                        .help("Build from this source tree instead of fetching the archive"),
                )
                .arg(source_cache_arg())
                .arg(flag("keep_builddir", "keep-builddir", "Keep the build directory after completion"))
                .arg(flag("dry_run", "dry-run", "Show what would run without running it"))
                .arg(flag(
                    "no_defaults",
                    "no-defaults",
                    "Do not seed options with the manifest's declared defaults",
                ))
                .arg(flag("json", "json", "Print the install report as JSON")),
        )
        .subcommand(
            Command::new("check")
                .about("Parse and validate a manifest")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("deps")
                .about("Show the dependencies selected for an option set")
                .arg(manifest_arg())
                .arg(flag(
                    "no_defaults",
                    "no-defaults",
                    "Do not seed options with the manifest's declared defaults",
                ))
                .arg(flag("json", "json", "Print the resolution as JSON")),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify the source archive only")
                .arg(manifest_arg())
                .arg(source_cache_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("formulary.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}

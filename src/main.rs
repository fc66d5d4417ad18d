// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use formulary::executor::CancelToken;
use formulary::install::InstallConfig;
use formulary::options::OptionSet;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    let (args, option_flags) = cli::split_option_flags(std::env::args_os());
    let cli = Cli::parse_from(args);

    // Initialize tracing subscriber for logging; RUST_LOG wins over -v/-q
    let default_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = OptionSet::from_flags(&option_flags) {
        Cli::command().error(ErrorKind::UnknownArgument, e).exit();
    }

    if let Err(err) = run(cli, &option_flags) {
        let (kind, code) = match err.downcast_ref::<formulary::Error>() {
            Some(e) => (e.kind(), e.exit_code()),
            None => ("Error", 1),
        };
        eprintln!("error[{}]: {:#}", kind, err);
        std::process::exit(code);
    }
}

fn run(cli: Cli, option_flags: &[String]) -> Result<()> {
    let takes_options = matches!(
        cli.command,
        Some(Commands::Install { .. }) | Some(Commands::Deps { .. })
    );
    if !takes_options && !option_flags.is_empty() {
        Cli::command()
            .error(
                ErrorKind::UnknownArgument,
                format!(
                    "option flags ({}) are only accepted by install and deps",
                    option_flags.join(", ")
                ),
            )
            .exit();
    }

    match cli.command {
        Some(Commands::Install {
            manifest,
            prefix,
            prefix_root,
            source_dir,
            source_cache,
            keep_builddir,
            dry_run,
            no_defaults,
            json,
        }) => {
            let mut config = InstallConfig {
                prefix_root: PathBuf::from(prefix_root),
                prefix: prefix.map(PathBuf::from),
                source_dir: source_dir.map(PathBuf::from),
                keep_builddir,
                dry_run,
                seed_defaults: !no_defaults,
                ..Default::default()
            };
            if let Some(cache) = source_cache {
                config.source_cache = PathBuf::from(cache);
            }

            let cancel = CancelToken::new();
            if let Err(e) = cancel.cancel_on_ctrlc() {
                warn!("Could not install Ctrl-C handler: {}", e);
            }

            commands::cmd_install(&manifest, option_flags, config, &cancel, json)
        }
        Some(Commands::Check { manifest }) => commands::cmd_check(&manifest),
        Some(Commands::Deps {
            manifest,
            no_defaults,
            json,
        }) => commands::cmd_deps(&manifest, option_flags, !no_defaults, json),
        Some(Commands::Fetch {
            manifest,
            source_cache,
        }) => commands::cmd_fetch(&manifest, source_cache.as_deref()),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

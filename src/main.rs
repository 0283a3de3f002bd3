//! QuietPatch catalog updater CLI entrypoint.
//!
//! Fetches, verifies and activates the latest vulnerability catalog. Exits 0
//! after activation and 1 with a diagnostic naming the failed step otherwise.

use clap::Parser;
use log::LevelFilter;
use quietpatch_catalog::cli::Cli;
use quietpatch_catalog::config::{SystemEnvironment, UpdateConfig};
use quietpatch_catalog::dirs::SystemBaseDirs;
use quietpatch_catalog::error::{Result, UpdaterError};
use quietpatch_catalog::output::{dry_run_text, write_stderr_line};
use quietpatch_catalog::pipeline::run_update;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let config = UpdateConfig::resolve(cli, &SystemEnvironment, &SystemBaseDirs)?;

    // Dry-run mode: show what would be done without side effects
    if cli.dry_run {
        write_stderr_line(stderr, dry_run_text(&config));
        return Ok(());
    }

    let report = run_update(&config, stderr)?;
    writeln!(stdout, "{}", report.display_text())
        .map_err(|source| UpdaterError::WriteFailed { source })
}

fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(level_for(cli))
        .parse_default_env()
        .format_target(false)
        .init();
}

/// Maps `-q` and repeated `-v` flags to a log level; `RUST_LOG` still wins.
fn level_for(cli: &Cli) -> LevelFilter {
    if cli.quiet {
        return LevelFilter::Error;
    }
    match cli.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("Error: {err}"));
            1
        }
    }
}

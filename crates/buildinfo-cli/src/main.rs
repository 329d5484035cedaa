//! buildinfo-cli: prints version information derived from git tags.

use std::path::PathBuf;
use std::process::ExitCode;

use buildinfo_core::Result;
use buildinfo_gen::{describe, Config, Field};
use clap::{CommandFactory, FromArgMatches, Parser};
use tracing::debug;

#[derive(Parser)]
#[command(name = "buildinfo")]
#[command(about = "Print version information from the repository's git tags", long_about = None)]
#[command(version)]
struct Cli {
    /// Use the latest tag instead of the current tag
    #[arg(short, long)]
    latest: bool,

    /// Repository directory
    #[arg(short = 'C', long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Deadline for each git command, in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Configuration file [env: BUILDINFO_CONFIG]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Output commands, or a single template such as "v{{.MajorMinor}}"
    args: Vec<String>,
}

fn output_commands() -> String {
    let mut help = String::from("Output commands:\n");
    for (_, name, description) in Field::ALL {
        help.push_str(&format!("  {name:<20}{description}\n"));
    }
    help
}

fn main() -> ExitCode {
    let matches = Cli::command().after_help(output_commands()).get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    if cli.verbose {
        buildinfo_core::logging::init_with_level("debug");
    } else {
        buildinfo_core::logging::init();
    }

    match run(cli) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("fatal error: {err}");
            ExitCode::from(exit_status(err.exit_code()))
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let mut config = load_config(cli.config)?;
    if cli.latest {
        config.git.latest = true;
    }
    if let Some(dir) = cli.dir {
        config.git.dir = Some(dir);
    }
    if let Some(secs) = cli.timeout {
        config.git.timeout_secs = secs;
    }
    debug!(?config, "effective configuration");

    describe(&config.git(), config.tag_mode(), &cli.args)
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path),
        None => Config::from_env(),
    }
}

/// Map an exit code hint onto the range a process can report.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}

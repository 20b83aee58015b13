use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{self, check::CheckArgs, reset::ResetArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "survey",
    about = "Run paged surveys from the terminal",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk through a survey page by page
    Run(RunArgs),
    /// Validate a survey document and list its pages
    Check(CheckArgs),
    /// Forget saved progress for a survey
    Reset(ResetArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Run(args) => cmd::run::run(args),
        Commands::Check(args) => cmd::check::run(args),
        Commands::Reset(args) => cmd::reset::run(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "survey",
            "-vv",
            "run",
            "--config",
            "survey.json",
            "--answers",
            "answers.json",
            "--no-resume",
            "--json",
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, Path::new("survey.json"));
                assert_eq!(args.answers.as_deref(), Some(Path::new("answers.json")));
                assert!(args.no_resume);
                assert!(args.json);
                assert!(args.state_dir.is_none());
                assert!(args.responses.is_none());
            }
            _ => panic!("expected run args"),
        }
    }

    #[test]
    fn parses_reset_with_state_dir() {
        let cli = Cli::try_parse_from([
            "survey",
            "reset",
            "--config",
            "survey.json",
            "--state-dir",
            "/tmp/state",
        ])
        .expect("expected CLI to parse");
        match cli.command {
            Commands::Reset(args) => {
                assert_eq!(args.state_dir.as_deref(), Some(Path::new("/tmp/state")));
            }
            _ => panic!("expected reset args"),
        }
    }

    #[test]
    fn check_requires_config() {
        assert!(Cli::try_parse_from(["survey", "check"]).is_err());
    }
}

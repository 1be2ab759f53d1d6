use std::borrow::Cow;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use flexi_logger::{FileSpec, LevelFilter, LogSpecification, Logger, LoggerHandle, WriteMode};

use garlic::{Context, DefaultContext};

mod check;
use check::Check;

mod list;
use list::List;

mod match_cert;
use match_cert::MatchCert;

mod utils;

const SIMPLE_VERSION_STRING: &str = include!(concat!(env!("OUT_DIR"), "/simple_version_string"));
const VERSION_STRING: &str = include!(concat!(env!("OUT_DIR"), "/version_string"));

#[derive(Parser)]
#[command(name = "garlic")]
#[command(version(SIMPLE_VERSION_STRING))]
#[command(long_version(VERSION_STRING))]
struct Cli {
    /// `-e`, `--log-stderr`: Send logs to `stderr` even when a project log
    /// file is available
    #[arg(short = 'e', long, help = "Log to stderr instead of a file", action = clap::ArgAction::SetTrue, default_value_t = false)]
    log_stderr: bool,

    /// `-f`, `--log-file`: Path to the log file. Defaults to
    /// `$GARLIC_PROJECT_HOME/garlic_out/log`, or `stderr` when no project is
    /// set up
    #[arg(short = 'f', long, help = "Send log output to the given file")]
    log_file: Option<PathBuf>,

    /// `-s`, `--log-spec`: A [flexi_logger](https://docs.rs/flexi_logger/latest/flexi_logger/struct.LogSpecification.html)
    /// log specification, overrides `--log-level`
    #[arg(short = 's', long, help = "Log spec for flexi_logger")]
    log_spec: Option<String>,

    /// `-l`, `--log-level`: Set the log verbosity:
    ///
    /// | Value | Log Level |
    /// | ----- | --------- |
    /// | **0** | **Warn** |
    /// | 1 | Info |
    /// | 2 | Debug |
    /// | 3 | Trace |
    #[arg(
        short = 'l',
        long,
        help = "Set the log level, 0 = warn, 1 = info, etc",
        long_help = None,
        default_value_t = 0
    )]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the full version string and exit
    #[command()]
    Version,

    /// Decide whether a package may install apps at garlic level Safest
    ///
    /// The device state is read from a TOML snapshot. Exits with 0 when the
    /// package is trusted and 1 otherwise.
    #[command()]
    Check(Check),

    /// Show the trusted installer allow-list
    #[command()]
    List(List),

    /// Compare two certificates the way signer checks do
    ///
    /// Exits with 0 on a match and 1 otherwise.
    #[command()]
    MatchCert(MatchCert),
}

fn log_level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Cli {
    fn configure_loggers(&self, ctx: &DefaultContext) -> anyhow::Result<LoggerHandle> {
        let log_spec = match &self.log_spec {
            Some(s) => {
                LogSpecification::parse(s).with_context(|| format!("parsing log spec {}", s))?
            }
            None => {
                if self.log_level > 0 {
                    LogSpecification::builder()
                        .module("garlic", log_level_filter(self.log_level))
                        .build()
                } else {
                    LogSpecification::env_or_parse("garlic=warn")
                        .with_context(|| "getting log spec from env")?
                }
            }
        };

        let mut logger = Logger::with(log_spec);

        if !self.log_stderr {
            let path = match &self.log_file {
                Some(v) => {
                    if v.is_absolute() {
                        Some(Cow::Borrowed(v))
                    } else {
                        let full_path = std::env::current_dir()?.join(v);
                        Some(Cow::Owned(full_path))
                    }
                }
                None => ctx.get_output_dir_child("log").map(Cow::Owned).ok(),
            };

            if let Some(p) = &path {
                logger = logger
                    .log_to_file(
                        FileSpec::try_from(p.as_ref()).with_context(|| "creating filespec")?,
                    )
                    .append()
                    .write_mode(WriteMode::BufferAndFlush);
            }
        }

        logger.start().with_context(|| "starting logger")
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Version = &cli.command {
        println!("{}", VERSION_STRING);
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = DefaultContext::new();

    let log_handle = cli.configure_loggers(&ctx)?;

    let res = match &cli.command {
        Commands::Check(c) => c.run().map(exit_code),
        Commands::List(c) => c.run().map(|_| ExitCode::SUCCESS),
        Commands::MatchCert(c) => c.run().map(exit_code),

        Commands::Version => unreachable!(),
    };

    log_handle.flush();
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(0, LevelFilter::Warn)]
    #[case(1, LevelFilter::Info)]
    #[case(2, LevelFilter::Debug)]
    #[case(3, LevelFilter::Trace)]
    #[case(9, LevelFilter::Trace)]
    fn test_log_level_filter(#[case] level: u8, #[case] expected: LevelFilter) {
        assert_eq!(log_level_filter(level), expected);
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "garlic",
            "-e",
            "-l",
            "2",
            "check",
            "com.aurora.store",
            "--snapshot",
            "device.toml",
            "--json",
        ])
        .expect("valid args");

        assert!(cli.log_stderr);
        assert_eq!(cli.log_level, 2);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn test_check_requires_snapshot() {
        assert!(Cli::try_parse_from(["garlic", "check", "com.aurora.store"]).is_err());
    }

    #[test]
    fn test_parse_match_cert() {
        let cli = Cli::try_parse_from(["garlic", "match-cert", "--hex", "3082", "3082"])
            .expect("valid args");
        assert!(matches!(cli.command, Commands::MatchCert(_)));
    }
}

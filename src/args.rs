use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

/// Discord bot to assist in "Vella Escola" role-playing sessions.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Bot security token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Logging flags shared by every binary of the crate.
#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// Level of logging to produce
    #[arg(long, value_enum, ignore_case = true, default_value = "INFO")]
    pub log_level: LogLevel,

    /// Specify a file to write the log
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose logging (equivalent to --log-level=DEBUG)
    #[arg(short, long)]
    pub verbose: bool,
}

impl LogArgs {
    pub fn level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            self.log_level.into()
        }
    }

    pub fn init(&self) -> anyhow::Result<()> {
        let builder = tracing_subscriber::fmt()
            .with_timer(ChronoLocal::rfc_3339())
            .with_max_level(self.level());

        let result = match &self.log_file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("cannot create log file {path:?}"))?;
                builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
            }
            None => builder.try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

        tracing::debug!("logging initialized: {:#?}", self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["vebot"]).unwrap();
        assert_eq!(args.log.level(), Level::INFO);
        assert!(args.log.log_file.is_none());
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "vebot",
            "--token",
            "abc",
            "--log-level",
            "warning",
            "--log-file",
            "vebot.log",
        ])
        .unwrap();
        assert_eq!(args.token.as_deref(), Some("abc"));
        assert_eq!(args.log.log_level, LogLevel::Warning);
        assert_eq!(args.log.level(), Level::WARN);
        assert_eq!(args.log.log_file, Some(PathBuf::from("vebot.log")));

        let args = Args::try_parse_from(["vebot", "--log-level", "CRITICAL"]).unwrap();
        assert_eq!(args.log.level(), Level::ERROR);
    }

    #[test]
    fn test_verbose_wins() {
        let args = Args::try_parse_from(["vebot", "-v", "--log-level", "ERROR"]).unwrap();
        assert_eq!(args.log.level(), Level::DEBUG);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        assert!(Args::try_parse_from(["vebot", "--log-level", "LOUD"]).is_err());
    }
}

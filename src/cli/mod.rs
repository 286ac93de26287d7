//! CLI module for iATW
//!
//! This module handles command-line argument parsing and command execution.

use clap::{Parser, Subcommand};

use crate::config::SettingsOverrides;
use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;

pub use args::{EvaluateArgs, FitArgs, InspectArgs};

/// iATW - interval-based time warping
///
/// Aligns a query signal to a reference signal interval by interval and fits
/// the alignment parameters.
#[derive(Parser, Debug)]
#[command(name = "iatw")]
#[command(about = "Interval-based time warping of one signal onto another")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the model a problem file describes
    Inspect(InspectArgs),
    /// Evaluate the loss terms at the file's parameter values
    Evaluate(EvaluateArgs),
    /// Fit the trainable parameters
    Fit(FitArgs),
}

impl Cli {
    /// Settings given on the command line
    pub fn overrides(&self) -> SettingsOverrides {
        let mut overrides = SettingsOverrides {
            log_level: self.log_level,
            log_format: self.log_format,
            ..SettingsOverrides::default()
        };
        if let Commands::Fit(args) = &self.command {
            overrides.max_iterations = args.max_iterations;
            overrides.learning_rate = args.learning_rate;
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fit_with_overrides() {
        let cli = Cli::try_parse_from([
            "iatw",
            "fit",
            "--problem",
            "p.toml",
            "--max-iterations",
            "5",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.max_iterations, Some(5));
        assert_eq!(overrides.log_level, Some(LogLevel::Debug));
        assert_eq!(overrides.learning_rate, None);
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["iatw", "--log-format", "xml", "inspect", "-p", "p.toml"]);
        assert!(result.is_err());
    }
}

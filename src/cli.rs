//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// filecourier - directory-watching file delivery agent
#[derive(Parser)]
#[command(
    name = "fcd",
    about = "Watches a directory and delivers new or changed files over HTTP",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the agent loop in the foreground
    Run,

    /// Execute exactly one scan/dispatch cycle, then exit
    Once,

    /// Show the persisted delivery state
    State {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for the state command
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["fcd", "run"]);
        assert!(matches!(cli.command, Command::Run));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_once_with_config() {
        let cli = Cli::parse_from(["fcd", "--config", "/etc/fcd.yml", "once"]);
        assert!(matches!(cli.command, Command::Once));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fcd.yml")));
    }

    #[test]
    fn test_cli_parse_state_json() {
        let cli = Cli::parse_from(["fcd", "state", "--format", "json"]);
        match cli.command {
            Command::State { format } => assert!(matches!(format, OutputFormat::Json)),
            _ => panic!("Expected State"),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}

//! CLI command definitions

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored table
    Table,
    /// JSON output
    Json,
}

impl OutputFormat {
    /// Parse the `output.format` config value
    pub fn from_config(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// CLI arguments for regpilot
#[derive(Parser, Debug)]
#[command(name = "regpilot")]
#[command(author, version, about = "Check and apply Windows registry settings")]
#[command(long_about = r#"
regpilot compares catalog settings with the live registry and moves them to
their enabled or disabled state.

Writes that are denied take ownership of the key once. When that is not
enough, the change is re-run as an elevated PowerShell script.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./regpilot.toml     Project-level config
3. ~/.config/regpilot/config.toml   Global config
Environment variables prefixed REGPILOT_ override all files
(e.g. REGPILOT_ENGINE__CACHE_READS=false).

Example:
  regpilot list
  regpilot status file_extensions hidden_files
  regpilot apply telemetry --enable
  regpilot --simulate --snapshot state.json apply copilot --disable
  regpilot power apply "Ultimate Performance" --enable
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format (defaults to output.format from config, then table)
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Catalog file to use instead of the configured or built-in one
    #[arg(long, value_name = "PATH", global = true)]
    pub catalog: Option<PathBuf>,

    /// Work against an in-memory registry instead of the real one
    #[arg(long, global = true)]
    pub simulate: bool,

    /// JSON snapshot loaded into the simulated registry and saved back
    /// after an apply
    #[arg(long, value_name = "PATH", requires = "simulate", global = true)]
    pub snapshot: Option<PathBuf>,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List catalog settings
    List,

    /// Show the status of settings (all when no id is given)
    Status {
        /// Setting ids
        #[arg(value_name = "ID")]
        ids: Vec<String>,

        /// Print read cache counters after the check
        #[arg(long)]
        cache_stats: bool,
    },

    /// Enable or disable one setting
    Apply {
        /// Setting id
        #[arg(value_name = "ID")]
        id: String,

        #[command(flatten)]
        state: TargetState,
    },

    /// Power plans
    #[command(subcommand)]
    Power(PowerCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PowerCommand {
    /// Show which known plans are active
    Status {
        /// Plan name (all known plans when omitted)
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Activate a plan, or fall back to Balanced when disabling it
    Apply {
        /// Plan name
        #[arg(value_name = "NAME")]
        name: String,

        #[command(flatten)]
        state: TargetState,
    },
}

/// `--enable` or `--disable`, exactly one
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
#[command(group(ArgGroup::new("state").required(true).args(["enable", "disable"])))]
pub struct TargetState {
    /// Move to the enabled state
    #[arg(long)]
    pub enable: bool,

    /// Move to the disabled state
    #[arg(long)]
    pub disable: bool,
}

impl TargetState {
    pub fn is_enable(&self) -> bool {
        self.enable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["regpilot", "apply", "telemetry", "--disable", "-o", "json"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Apply {
                id: "telemetry".into(),
                state: TargetState {
                    enable: false,
                    disable: true
                },
            })
        );
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_apply_requires_exactly_one_state() {
        assert!(Cli::try_parse_from(["regpilot", "apply", "x"]).is_err());
        assert!(Cli::try_parse_from(["regpilot", "apply", "x", "--enable", "--disable"]).is_err());
    }

    #[test]
    fn test_parse_power_and_status() {
        let cli = Cli::try_parse_from(["regpilot", "-vv", "power", "apply", "Balanced", "--enable"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Some(Command::Power(PowerCommand::Apply { ref name, state })) if name == "Balanced" && state.is_enable()
        ));

        let cli = Cli::try_parse_from(["regpilot", "status", "a", "b", "--cache-stats"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Status {
                ids: vec!["a".into(), "b".into()],
                cache_stats: true
            })
        );
    }

    #[test]
    fn test_snapshot_requires_simulate() {
        assert!(Cli::try_parse_from(["regpilot", "--snapshot", "s.json", "list"]).is_err());
        let cli = Cli::try_parse_from(["regpilot", "--simulate", "--snapshot", "s.json", "list"]).unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("s.json")));
    }

    #[test]
    fn test_output_format_from_config() {
        assert_eq!(OutputFormat::from_config("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config("table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_config("yaml"), None);
    }
}

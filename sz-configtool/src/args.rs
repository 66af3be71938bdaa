//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Utility to view and manipulate the Senzing configuration.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "sz_configtool",
    about = "Utility to view and manipulate the Senzing configuration.",
    version
)]
pub struct Cli {
    /// Path and file name of file with commands to process
    pub file_to_process: Option<PathBuf>,

    /// Path and file name of optional settings file
    #[arg(short = 'c', long = "ini-file-name")]
    pub ini_file_name: Option<PathBuf>,

    /// Disable confirmations for deletions and unsaved changes
    #[arg(short, long)]
    pub force: bool,

    /// Disable saving history of commands processed
    #[arg(short = 'H', long = "hist-disable")]
    pub hist_disable: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short = 't', long = "verbose-logging")]
    pub verbose_logging: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::parse_from([
            "sz_configtool",
            "commands.txt",
            "-c",
            "settings.toml",
            "-f",
            "-H",
            "--no-color",
            "-t",
        ]);
        assert_eq!(cli.file_to_process, Some(PathBuf::from("commands.txt")));
        assert_eq!(cli.ini_file_name, Some(PathBuf::from("settings.toml")));
        assert!(cli.force && cli.hist_disable && cli.no_color && cli.verbose_logging);
    }

    #[test]
    fn test_defaults_to_interactive() {
        let cli = Cli::parse_from(["sz_configtool"]);
        assert!(cli.file_to_process.is_none());
        assert!(!cli.force);
    }
}

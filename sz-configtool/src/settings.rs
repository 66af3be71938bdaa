//! Settings file and resolved runtime configuration.
//!
//! The settings file is optional TOML:
//!
//! ```toml
//! [repository]
//! path = "/var/lib/senzing/config"
//!
//! [shell]
//! pager = "less"
//! history_file = "~/.sz_configtool_history"
//! ```
//!
//! It is looked up from `-c/--ini-file-name`, then the `SZ_CONFIGTOOL_INI`
//! environment variable, then `./sz_configtool.toml`. Missing sections fall
//! back to defaults under the user's home directory.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::args::Cli;

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "SZ_CONFIGTOOL_INI";
/// Settings file picked up from the working directory.
pub const LOCAL_SETTINGS_FILE: &str = "sz_configtool.toml";
const DEFAULT_HISTORY_FILE: &str = ".sz_configtool_history";

/// Contents of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SettingsFile {
    /// Where configurations are stored.
    pub repository: RepositorySettings,
    /// Interactive shell options.
    pub shell: ShellSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositorySettings {
    /// Directory of the local configuration repository.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellSettings {
    /// Pager command, overrides `$PAGER`.
    pub pager: Option<String>,
    /// Command history file.
    pub history_file: Option<String>,
}

impl SettingsFile {
    /// Parse a settings file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read settings file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid settings file {}", path.display()))
    }
}

/// Process environment the configuration is resolved against.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub settings_file: Option<PathBuf>,
    pub pager: Option<String>,
    pub cwd: PathBuf,
    pub home: PathBuf,
}

impl Environment {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        Self {
            settings_file: env::var_os(SETTINGS_ENV).filter(|v| !v.is_empty()).map(PathBuf::from),
            pager: env::var("PAGER").ok().filter(|v| !v.trim().is_empty()),
            cwd: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            home,
        }
    }
}

/// Every runtime switch of the tool, built once in `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Settings file that was loaded, if any.
    pub settings_path: Option<PathBuf>,
    /// Local configuration repository directory.
    pub repository: PathBuf,
    /// Pager command line, `None` for the built-in choice.
    pub pager: Option<String>,
    pub history_file: PathBuf,
    pub history_enabled: bool,
    /// Skip confirmation prompts.
    pub force: bool,
    pub color: bool,
    pub verbose: bool,
    /// Batch file to execute instead of the interactive loop.
    pub file_to_process: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Resolve the configuration for `cli` against the live environment.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        Self::resolve(cli, &Environment::capture())
    }

    /// Resolve the configuration for `cli` against `env`.
    ///
    /// # Errors
    ///
    /// Fails when an explicitly named settings file is missing or invalid.
    pub fn resolve(cli: &Cli, env: &Environment) -> anyhow::Result<Self> {
        let settings_path = match cli.ini_file_name.as_ref().or(env.settings_file.as_ref()) {
            Some(path) => Some(absolute(path, &env.cwd)),
            None => Some(env.cwd.join(LOCAL_SETTINGS_FILE)).filter(|p| p.is_file()),
        };
        let settings = match &settings_path {
            Some(path) => {
                debug!("loading settings from {}", path.display());
                SettingsFile::load(path)?
            }
            None => SettingsFile::default(),
        };

        let repository = match &settings.repository.path {
            Some(path) => absolute(&expand_home(path, &env.home), &env.cwd),
            None => env.home.join(".senzing").join("config"),
        };
        let history_file = match &settings.shell.history_file {
            Some(path) => absolute(&expand_home(path, &env.home), &env.cwd),
            None => env.home.join(DEFAULT_HISTORY_FILE),
        };

        Ok(Self {
            settings_path,
            repository,
            pager: settings.shell.pager.clone().or_else(|| env.pager.clone()),
            history_file,
            history_enabled: !cli.hist_disable,
            force: cli.force,
            color: !cli.no_color,
            verbose: cli.verbose_logging,
            file_to_process: cli.file_to_process.clone(),
        })
    }
}

fn expand_home(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Some("") => home.to_path_buf(),
        Some(rest) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

fn absolute(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) }
}

//! # sz-configtool
//!
//! Interactive shell for viewing and editing a Senzing engine configuration.
//!
//! The shell reads one command per line, either from the terminal or from a
//! batch file, dispatches it through a static registry of verbs and renders
//! the result as a table, pretty JSON or JSON lines.
//!
//! ## Modules
//!
//! - [`args`] - Command line arguments
//! - [`settings`] - Settings file and resolved runtime configuration
//! - [`display`] - Message, table and JSON rendering
//! - [`pager`] - External and internal pagers for long output
//! - [`history`] - Persistent command history
//! - [`input`] - Line sources for interactive and piped input
//! - [`shell`] - The read-eval-print loop and batch runner
//! - [`commands`] - Command registry and handlers

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod args;
pub mod commands;
pub mod display;
pub mod history;
pub mod input;
pub mod pager;
pub mod settings;
pub mod shell;

pub use settings::RuntimeConfig;
pub use shell::{Flow, Shell};

//! The read-eval-print loop and batch runner.
//!
//! A [`Shell`] owns the configuration session and everything a command
//! handler needs: the display formatter, the pager, history and the line
//! source used for confirmations. Each input line is split into a verb and
//! an argument string and dispatched through the [`Registry`]. Handler
//! errors are printed and never end the loop.

use std::{
    fs,
    io::{self, Write},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Context;
use szconfig::ConfigManager;

use crate::{
    commands::Registry,
    display::{DisplayFormatter, OutputFormat},
    history::History,
    input::{LineSource, ReadOutcome},
    pager::Pager,
    settings::RuntimeConfig,
};

/// Prompt shown before every interactive command.
pub const PROMPT: &str = "(szcfg) ";
/// Comment stored with a configuration saved without one.
pub const DEFAULT_SAVE_COMMENT: &str = "Updated by sz_configtool";
const INTERRUPT_HINT: &str = "Use 'quit' or 'exit' to leave";

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    pub(crate) manager: ConfigManager,
    pub(crate) config: RuntimeConfig,
    pub(crate) display: DisplayFormatter,
    pub(crate) history: History,
    pager: Pager,
    input: Box<dyn LineSource>,
    out: Box<dyn Write>,
    list_format: OutputFormat,
    record_format: OutputFormat,
    registry: Registry,
    interrupted: Arc<AtomicBool>,
}

impl Shell {
    /// A shell over an initialised `manager`, printing to `out`.
    ///
    /// Paging is off until [`Shell::with_pager`] is called.
    pub fn new(manager: ConfigManager, config: RuntimeConfig, input: Box<dyn LineSource>, out: Box<dyn Write>) -> Self {
        let history = if config.history_enabled {
            History::load(&config.history_file)
        } else {
            History::disabled()
        };
        Self {
            manager,
            display: DisplayFormatter::new(config.color),
            history,
            config,
            pager: Pager::disabled(),
            input,
            out,
            list_format: OutputFormat::Table,
            record_format: OutputFormat::Json,
            registry: Registry::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_pager(mut self, pager: Pager) -> Self {
        self.pager = pager;
        self
    }

    pub fn manager(&mut self) -> &mut ConfigManager {
        &mut self.manager
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Flag a signal handler sets to interrupt the running command.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Run one command line.
    pub fn execute(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        let line = match line.strip_prefix('?') {
            Some(rest) => format!("help {rest}"),
            None => line.to_string(),
        };
        let (verb, arg) = split_verb(&line);
        let Some(command) = self.registry.get(verb).copied() else {
            self.error(format!("Unknown command: {verb}. Type 'help' for available commands."));
            return Flow::Continue;
        };
        debug!("executing {} with {arg:?}", command.name);
        self.take_interrupt();
        let flow = match (command.handler)(self, arg) {
            Ok(flow) => flow,
            Err(e) => {
                debug!("{} failed: {e:?}", command.name);
                self.error(format!("{e:#}"));
                Flow::Continue
            }
        };
        if self.interrupted.load(Ordering::SeqCst) {
            self.warning(format!("{} interrupted", command.name));
            return Flow::Continue;
        }
        flow
    }

    /// Read and execute commands until `quit`, `exit` or end of input.
    pub fn run_interactive(&mut self) -> anyhow::Result<()> {
        let banner = self
            .display
            .highlight("\n\nWelcome to the Senzing configuration tool!\nType help or ? for commands\n");
        self.print(&banner);
        loop {
            let prompt = self.display.highlight(PROMPT);
            match self.input.read_line(&prompt, self.history.entries())? {
                ReadOutcome::Line(line) => {
                    if self.registry.get(split_verb(line.trim()).0).is_some() {
                        self.history.add(&line);
                    }
                    if self.execute(&line) == Flow::Quit {
                        break;
                    }
                }
                ReadOutcome::Interrupted => self.info(INTERRUPT_HINT),
                ReadOutcome::Eof => {
                    if self.execute("quit") == Flow::Quit {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Execute every non-blank line of `path` that is not a `#` comment.
    ///
    /// # Errors
    ///
    /// Fails only when the file cannot be read; command errors are printed.
    pub fn run_batch(&mut self, path: &Path) -> anyhow::Result<()> {
        let text = fs::read_to_string(path).with_context(|| format!("Error reading file {}", path.display()))?;
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.take_interrupt() {
                self.warning("Batch interrupted");
                break;
            }
            self.print(&format!("Executing: {line}"));
            if self.execute(line) == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// End the session.
    pub fn close(&mut self) {
        self.manager.close();
        if let Err(e) = self.out.flush() {
            debug!("flush failed: {e}");
        }
    }

    /// Print `text`, through the pager when it does not fit on screen.
    pub(crate) fn print(&mut self, text: &str) {
        match self.pager.page(text) {
            Ok(true) => {
                // Ctrl+C inside the pager only ends the pager.
                self.take_interrupt();
                return;
            }
            Ok(false) => {}
            Err(e) => debug!("pager unavailable: {e}"),
        }
        if let Err(e) = writeln!(self.out, "{text}").and_then(|_| self.out.flush()) {
            warn!("failed to write output: {e}");
        }
    }

    pub(crate) fn error(&mut self, message: impl std::fmt::Display) {
        let text = self.display.error(message);
        self.print(&text);
    }

    pub(crate) fn success(&mut self, message: impl std::fmt::Display) {
        let text = self.display.success(message);
        self.print(&text);
    }

    pub(crate) fn warning(&mut self, message: impl std::fmt::Display) {
        let text = self.display.warning(message);
        self.print(&text);
    }

    pub(crate) fn info(&mut self, message: impl std::fmt::Display) {
        let text = self.display.info(message);
        self.print(&text);
    }

    /// Format for list output, remembering an explicit request.
    pub(crate) fn list_format(&mut self, requested: Option<OutputFormat>) -> OutputFormat {
        if let Some(format) = requested {
            self.list_format = format;
        }
        self.list_format
    }

    /// Format for single record output, remembering an explicit request.
    pub(crate) fn record_format(&mut self, requested: Option<OutputFormat>) -> OutputFormat {
        if let Some(format) = requested {
            self.record_format = format;
        }
        self.record_format
    }

    /// Ask a yes/no question. `None` when the user pressed `Ctrl+C`.
    pub(crate) fn ask(&mut self, question: &str) -> io::Result<Option<bool>> {
        let prompt = format!("{question} (yes/no) ");
        match self.input.read_line(&prompt, &[])? {
            ReadOutcome::Line(answer) => Ok(Some(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))),
            ReadOutcome::Interrupted => {
                self.info(INTERRUPT_HINT);
                Ok(None)
            }
            ReadOutcome::Eof => Ok(Some(false)),
        }
    }

    /// Confirm a destructive command. Always `true` in force mode.
    pub(crate) fn confirm(&mut self, question: &str) -> io::Result<bool> {
        if self.config.force {
            return Ok(true);
        }
        match self.ask(question)? {
            Some(true) => Ok(true),
            Some(false) => {
                self.info("Cancelled");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

fn split_verb(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_verb() {
        assert_eq!(split_verb("getFeature NAME json"), ("getFeature", "NAME json"));
        assert_eq!(split_verb("save"), ("save", ""));
        assert_eq!(split_verb("addFeature   {\"feature\": \"X\"} "), ("addFeature", "{\"feature\": \"X\"}"));
    }
}

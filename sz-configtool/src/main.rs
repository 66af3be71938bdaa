use std::{
    io::{self, IsTerminal},
    process::ExitCode,
    sync::atomic::Ordering,
};

use clap::Parser;
use colored::Colorize;
use log::LevelFilter;
use sz_configtool::{
    RuntimeConfig, Shell,
    args::Cli,
    input::{LineSource, PlainReader, TerminalEditor},
    pager::Pager,
};
use szconfig::{ConfigManager, backend::LocalRepository};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose_logging { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}\n", format!("Error: {e:#}").red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = RuntimeConfig::from_cli(cli)?;
    if !config.color {
        colored::control::set_override(false);
    }
    log::debug!("runtime configuration: {config:?}");

    let repository = LocalRepository::open(&config.repository)?;
    let mut manager = ConfigManager::new(Box::new(repository));
    manager.initialize()?;

    let input: Box<dyn LineSource> = if io::stdin().is_terminal() {
        Box::new(TerminalEditor::new())
    } else {
        Box::new(PlainReader::stdin())
    };
    let pager = Pager::new(config.pager.clone());
    let batch = config.file_to_process.clone();
    let mut shell = Shell::new(manager, config, input, Box::new(io::stdout())).with_pager(pager);

    let interrupted = shell.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst)) {
        log::warn!("Ctrl+C handler not installed: {e}");
    }

    let result = match &batch {
        Some(path) => shell.run_batch(path),
        None => shell.run_interactive(),
    };
    shell.close();
    result
}

//! Shell built-ins: help, quit/exit, history, shell and setTheme.

use std::process;

use super::{Command, positional};
use crate::{
    history::MAX_ENTRIES,
    shell::{DEFAULT_SAVE_COMMENT, Flow, Shell},
};

const DEFAULT_HISTORY_LINES: usize = 20;

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        brief: "Display help for commands.",
        syntax: "help [command]",
        handler: help,
    },
    Command {
        name: "quit",
        brief: "Exit the configuration tool.",
        syntax: "quit\n\nAsks whether to save when there are unsaved changes.",
        handler: quit,
    },
    Command {
        name: "exit",
        brief: "Exit the configuration tool.",
        syntax: "exit\n\nAsks whether to save when there are unsaved changes.",
        handler: quit,
    },
    Command {
        name: "history",
        brief: "Show command history.",
        syntax: "history [number_of_lines]\n\nShows the last 20 commands by default.",
        handler: history,
    },
    Command {
        name: "shell",
        brief: "Execute shell command.",
        syntax: "shell <command>",
        handler: shell_command,
    },
    Command {
        name: "setTheme",
        brief: "Enable or disable colored output.",
        syntax: "setTheme [color|nocolor]\n\nWithout an argument shows the current setting.",
        handler: set_theme,
    },
];

fn help(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let topic = arg.trim();
    if topic.is_empty() {
        let text = shell.display.help_topic("Commands", &overview(shell));
        shell.print(&text);
        return Ok(Flow::Continue);
    }
    match shell.registry().get(topic).copied() {
        Some(command) => {
            let body = format!("{}\n\nSyntax:\n    {}", command.brief, command.syntax.replace('\n', "\n    "));
            let text = shell.display.help_topic(command.name, &body);
            shell.print(&text);
        }
        None => shell.error(format!("Unknown command: {topic}")),
    }
    Ok(Flow::Continue)
}

fn overview(shell: &Shell) -> String {
    let categories = shell.registry().categories();
    let total: usize = categories.iter().map(|(_, commands)| commands.len()).sum();
    let title = "sz_configtool - Senzing Configuration Management Tool";

    let mut lines = vec![String::new(), title.to_string(), "=".repeat(title.len()), String::new()];
    lines.push(format!("TOTAL COMMANDS AVAILABLE: {total}"));
    lines.push(String::new());
    for (category, commands) in categories.iter().filter(|(_, commands)| !commands.is_empty()) {
        lines.push(format!("\n{category}: ({} commands)", commands.len()));
        for command in commands {
            lines.push(format!("  {:<25} - {}", command.name, command.brief));
        }
    }
    lines.push("\nUsage:".to_string());
    lines.push("  help <command>        - Show detailed help for specific command".to_string());
    lines.push("  <command> [args]      - Execute the specified command".to_string());
    lines.push("  quit/exit            - Exit the configuration tool".to_string());
    lines.join("\n")
}

fn quit(shell: &mut Shell, _arg: &str) -> anyhow::Result<Flow> {
    if shell.manager.is_dirty() {
        if shell.config.force {
            shell.warning("Unsaved changes discarded");
        } else {
            match shell.ask("There are unsaved changes. Save them before exiting?")? {
                Some(true) => {
                    let config_id = shell.manager.save_config(DEFAULT_SAVE_COMMENT)?;
                    shell.success(format!("Configuration saved with ID: {config_id}"));
                }
                Some(false) => shell.warning("Unsaved changes discarded"),
                None => return Ok(Flow::Continue),
            }
        }
    }
    shell.info("Goodbye!");
    Ok(Flow::Quit)
}

fn history(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    if !shell.history.is_enabled() {
        shell.info("Command history is disabled");
        return Ok(Flow::Continue);
    }
    let count = match arg.trim() {
        "" => DEFAULT_HISTORY_LINES,
        text => text.parse().map_err(|_| anyhow!("Number of lines must be a number"))?,
    };
    let mut lines = vec![format!("Command history ({} entries, max {MAX_ENTRIES}):", shell.history.len())];
    lines.extend(shell.history.recent(count).into_iter().map(|(n, item)| format!("{n:2}: {item}")));
    let text = lines.join("\n");
    shell.print(&text);
    Ok(Flow::Continue)
}

fn shell_command(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let command = arg.trim();
    if command.is_empty() {
        bail!("Shell command is required");
    }
    let output = match std::env::consts::OS {
        "windows" => process::Command::new("powershell").arg("-Command").arg(command).output(),
        _ => process::Command::new("sh").arg("-c").arg(command).output(),
    }
    .map_err(|e| anyhow!("Failed to run shell command: {e}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim_end().is_empty() {
        shell.print(stdout.trim_end());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        shell.error(stderr.trim_end());
    }
    if !output.status.success() {
        debug!("shell command exited with {}", output.status);
    }
    Ok(Flow::Continue)
}

fn set_theme(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    match positional(arg).first().map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("color" | "colour") => {
            shell.display.force_color();
            shell.success("Colored output enabled");
        }
        Some("nocolor" | "nocolour") => {
            shell.display.set_color(false);
            shell.success("Colored output disabled");
        }
        Some(other) => bail!("Unknown theme: {other}. Use color or nocolor"),
        None => {
            let state = if shell.display.color_enabled() { "enabled" } else { "disabled" };
            shell.info(format!("Current theme: colored output is {state}"));
        }
    }
    Ok(Flow::Continue)
}

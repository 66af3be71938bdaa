//! External and internal pagers for long output.
//!
//! Output taller than the terminal is piped to the configured pager, or to
//! `less -S -R` when it is installed. Without either, a built-in pager
//! pages through the text with:
//!
//! - `Enter`/`Space`/`PageDown` next page, `b`/`PageUp` previous page
//! - `Left`/`Right` (or `<`/`>`) scroll wide lines horizontally
//! - `a` print the rest, `q`/`Esc` quit

use std::{
    env,
    io::{self, ErrorKind, IsTerminal, Write},
    process::{Command, Stdio},
};

use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, Clear, ClearType},
};

const SCROLL_STEP: usize = 20;
const RESERVED_ROWS: usize = 3;

#[derive(Debug, Clone)]
pub struct Pager {
    command: Option<String>,
    enabled: bool,
}

impl Pager {
    /// A pager using `command`, or the built-in choice when `None`.
    pub fn new(command: Option<String>) -> Self {
        Self { command, enabled: true }
    }

    /// A pager that never pages.
    pub fn disabled() -> Self {
        Self {
            command: None,
            enabled: false,
        }
    }

    /// Page `text` if stdout is a terminal and the text does not fit on it.
    ///
    /// Returns `false` when the caller should print the text itself.
    pub fn page(&self, text: &str) -> io::Result<bool> {
        if !self.enabled || !io::stdout().is_terminal() {
            return Ok(false);
        }
        let (width, height) = terminal::size()?;
        let rows = usize::from(height).saturating_sub(RESERVED_ROWS).max(1);
        if text.lines().count() <= rows {
            return Ok(false);
        }
        if self.run_external(text) {
            return Ok(true);
        }
        internal_pager(text, rows, usize::from(width))?;
        Ok(true)
    }

    fn external_command(&self) -> Option<Vec<String>> {
        match &self.command {
            Some(command) => {
                let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
                (!parts.is_empty()).then_some(parts)
            }
            None => find_in_path("less").then(|| vec!["less".into(), "-S".into(), "-R".into()]),
        }
    }

    fn run_external(&self, text: &str) -> bool {
        let Some(parts) = self.external_command() else {
            return false;
        };
        let child = Command::new(&parts[0]).args(&parts[1..]).stdin(Stdio::piped()).spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                debug!("pager {} unavailable: {e}", parts[0]);
                return false;
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(text.as_bytes()) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => debug!("pager {} closed its input", parts[0]),
                Err(e) => warn!("writing to pager {} failed: {e}", parts[0]),
                Ok(()) => {}
            }
        }
        if let Err(e) = child.wait() {
            warn!("pager {} failed: {e}", parts[0]);
        }
        true
    }
}

fn find_in_path(program: &str) -> bool {
    env::var_os("PATH").is_some_and(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
}

enum PagerKey {
    Next,
    Back,
    Left,
    Right,
    All,
    Quit,
}

fn read_pager_key() -> io::Result<PagerKey> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let action = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => PagerKey::Quit,
            KeyCode::Char('q') | KeyCode::Esc => PagerKey::Quit,
            KeyCode::Char('b') | KeyCode::PageUp => PagerKey::Back,
            KeyCode::Char('a') => PagerKey::All,
            KeyCode::Char('<') | KeyCode::Left => PagerKey::Left,
            KeyCode::Char('>') | KeyCode::Right => PagerKey::Right,
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::PageDown | KeyCode::Char('n') => PagerKey::Next,
            _ => continue,
        };
        return Ok(action);
    }
}

fn internal_pager(text: &str, rows: usize, width: usize) -> io::Result<()> {
    let lines: Vec<&str> = text.lines().collect();
    let mut stdout = io::stdout();
    let mut top = 0;
    let mut offset = 0;

    while top < lines.len() {
        let end = (top + rows).min(lines.len());
        queue!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        for line in &lines[top..end] {
            queue!(stdout, Print(slice_visible(line, offset, width)), Print("\n"))?;
        }
        queue!(stdout, Print(format!("\n{}\n", status_line(top, end, lines.len(), offset))))?;
        queue!(stdout, Print("[Enter=next, b=back, q=quit, a=all, →/←=scroll right/left]"))?;
        stdout.flush()?;

        terminal::enable_raw_mode()?;
        let key = read_pager_key();
        terminal::disable_raw_mode()?;
        println!();

        match key? {
            PagerKey::Quit => break,
            PagerKey::All => {
                for line in &lines[end..] {
                    println!("{line}");
                }
                break;
            }
            PagerKey::Back => top = top.saturating_sub(rows),
            PagerKey::Right => offset += SCROLL_STEP,
            PagerKey::Left => offset = offset.saturating_sub(SCROLL_STEP),
            PagerKey::Next => {
                top = end;
                offset = 0;
            }
        }
    }
    Ok(())
}

fn status_line(top: usize, end: usize, total: usize, offset: usize) -> String {
    let mut status = format!("Lines {}-{end} of {total}", top + 1);
    if offset > 0 {
        status.push_str(&format!(" (offset: {offset} chars)"));
    }
    if end < total {
        status.push_str(&format!(" ({} more lines)", total - end));
    }
    status
}

/// Visible characters `offset..offset + width` of `line`. ANSI escape
/// sequences are kept so colors survive; a line cut short ends in `...`.
fn slice_visible(line: &str, offset: usize, width: usize) -> String {
    let visible = visible_len(line);
    let truncate = visible.saturating_sub(offset) > width && width > 3;
    let limit = if truncate { width - 3 } else { width };

    let mut out = String::new();
    let mut position = 0;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            out.push(c);
            for next in chars.by_ref() {
                out.push(next);
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        if position >= offset && position < offset + limit {
            out.push(c);
        }
        position += 1;
    }
    if truncate {
        out.push_str("...");
    }
    out
}

fn visible_len(line: &str) -> usize {
    let mut count = 0;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            chars.by_ref().find(|next| next.is_ascii_alphabetic());
        } else {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_plain_line() {
        assert_eq!(slice_visible("abcdefghij", 0, 20), "abcdefghij");
        assert_eq!(slice_visible("abcdefghij", 2, 20), "cdefghij");
        assert_eq!(slice_visible("abcdefghij", 0, 6), "abc...");
    }

    #[test]
    fn test_slice_keeps_escape_sequences() {
        let line = "\u{1b}[36mabcdef\u{1b}[0m";
        assert_eq!(slice_visible(line, 3, 10), "\u{1b}[36mdef\u{1b}[0m");
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(0, 20, 50, 0), "Lines 1-20 of 50 (30 more lines)");
        assert_eq!(status_line(40, 50, 50, 20), "Lines 41-50 of 50 (offset: 20 chars)");
    }

    #[test]
    fn test_configured_pager_command() {
        let pager = Pager::new(Some("more -d".into()));
        assert_eq!(pager.external_command(), Some(vec!["more".to_string(), "-d".to_string()]));
        assert!(!Pager::disabled().page("text").unwrap());
    }
}

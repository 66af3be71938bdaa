//! Line sources for interactive and piped input.
//!
//! [`TerminalEditor`] is a small line editor on top of crossterm raw mode:
//!
//! - `Left`/`Right`/`Home`/`End` (and `Ctrl+A`/`Ctrl+E`) move the cursor
//! - `Up`/`Down` recall history
//! - `Ctrl+C` abandons the line, `Ctrl+D` on an empty line ends input
//!
//! [`PlainReader`] reads whole lines from any [`BufRead`] and is used when
//! stdin is not a terminal and in tests.

use std::io::{self, BufRead, Write};

use crossterm::{
    cursor::MoveToColumn,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, Clear, ClearType},
};

/// Result of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// The user pressed `Ctrl+C`.
    Interrupted,
    /// End of input.
    Eof,
}

/// Something the shell can read command lines and answers from.
pub trait LineSource {
    /// Show `prompt` and read one line. `history` is offered for recall.
    fn read_line(&mut self, prompt: &str, history: &[String]) -> io::Result<ReadOutcome>;
}

/// Reads lines from a buffered reader without any editing.
pub struct PlainReader<R> {
    reader: R,
    echo_prompt: bool,
}

impl<R: BufRead> PlainReader<R> {
    /// A reader that never prints prompts.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            echo_prompt: false,
        }
    }
}

impl PlainReader<io::StdinLock<'static>> {
    /// Piped stdin. Prompts are still printed so transcripts stay readable.
    pub fn stdin() -> Self {
        Self {
            reader: io::stdin().lock(),
            echo_prompt: true,
        }
    }
}

impl<R: BufRead> LineSource for PlainReader<R> {
    fn read_line(&mut self, prompt: &str, _history: &[String]) -> io::Result<ReadOutcome> {
        if self.echo_prompt {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
        }
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        Ok(ReadOutcome::Line(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Interactive line editor for a terminal.
#[derive(Debug, Default)]
pub struct TerminalEditor;

impl TerminalEditor {
    pub fn new() -> Self {
        Self
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Line buffer and cursor of the editor, kept apart from the terminal so
/// key handling can be tested.
#[derive(Debug, Default)]
struct LineState {
    chars: Vec<char>,
    cursor: usize,
    recall: Option<usize>,
    draft: Vec<char>,
}

enum KeyAction {
    Redraw,
    Submit,
    Interrupt,
    Eof,
    Ignore,
}

impl LineState {
    fn text(&self) -> String {
        self.chars.iter().collect()
    }

    fn set(&mut self, text: &[char]) {
        self.chars = text.to_vec();
        self.cursor = self.chars.len();
    }

    fn handle(&mut self, key: KeyEvent, history: &[String]) -> KeyAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => KeyAction::Interrupt,
            KeyCode::Char('d') if ctrl && self.chars.is_empty() => KeyAction::Eof,
            KeyCode::Char('a') if ctrl => {
                self.cursor = 0;
                KeyAction::Redraw
            }
            KeyCode::Char('e') if ctrl => {
                self.cursor = self.chars.len();
                KeyAction::Redraw
            }
            KeyCode::Char('u') if ctrl => {
                self.chars.drain(..self.cursor);
                self.cursor = 0;
                KeyAction::Redraw
            }
            KeyCode::Char(_) if ctrl => KeyAction::Ignore,
            KeyCode::Char(c) => {
                self.chars.insert(self.cursor, c);
                self.cursor += 1;
                KeyAction::Redraw
            }
            KeyCode::Enter => KeyAction::Submit,
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.chars.remove(self.cursor);
                KeyAction::Redraw
            }
            KeyCode::Delete if self.cursor < self.chars.len() => {
                self.chars.remove(self.cursor);
                KeyAction::Redraw
            }
            KeyCode::Left if self.cursor > 0 => {
                self.cursor -= 1;
                KeyAction::Redraw
            }
            KeyCode::Right if self.cursor < self.chars.len() => {
                self.cursor += 1;
                KeyAction::Redraw
            }
            KeyCode::Home => {
                self.cursor = 0;
                KeyAction::Redraw
            }
            KeyCode::End => {
                self.cursor = self.chars.len();
                KeyAction::Redraw
            }
            KeyCode::Up if !history.is_empty() => {
                let index = match self.recall {
                    None => {
                        self.draft = self.chars.clone();
                        history.len() - 1
                    }
                    Some(i) => i.saturating_sub(1),
                };
                self.recall = Some(index);
                let entry: Vec<char> = history[index].chars().collect();
                self.set(&entry);
                KeyAction::Redraw
            }
            KeyCode::Down => match self.recall {
                Some(i) if i + 1 < history.len() => {
                    self.recall = Some(i + 1);
                    let entry: Vec<char> = history[i + 1].chars().collect();
                    self.set(&entry);
                    KeyAction::Redraw
                }
                Some(_) => {
                    self.recall = None;
                    let draft = std::mem::take(&mut self.draft);
                    self.set(&draft);
                    KeyAction::Redraw
                }
                None => KeyAction::Ignore,
            },
            _ => KeyAction::Ignore,
        }
    }
}

impl LineSource for TerminalEditor {
    fn read_line(&mut self, prompt: &str, history: &[String]) -> io::Result<ReadOutcome> {
        let mut stdout = io::stdout();
        let prompt_width = visible_width(prompt);
        let mut state = LineState::default();

        let _raw = RawModeGuard::enable()?;
        queue!(stdout, Print(prompt))?;
        stdout.flush()?;

        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let outcome = match state.handle(key, history) {
                KeyAction::Ignore => continue,
                KeyAction::Redraw => {
                    let column = u16::try_from(prompt_width + state.cursor).unwrap_or(u16::MAX);
                    queue!(
                        stdout,
                        MoveToColumn(0),
                        Clear(ClearType::CurrentLine),
                        Print(prompt),
                        Print(state.text()),
                        MoveToColumn(column)
                    )?;
                    stdout.flush()?;
                    continue;
                }
                KeyAction::Submit => ReadOutcome::Line(state.text()),
                KeyAction::Interrupt => ReadOutcome::Interrupted,
                KeyAction::Eof => ReadOutcome::Eof,
            };
            queue!(stdout, Print("\r\n"))?;
            stdout.flush()?;
            return Ok(outcome);
        }
    }
}

/// Width of `text` on screen, skipping ANSI escape sequences.
fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else if c != '\n' && c != '\r' {
            width += 1;
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(state: &mut LineState, text: &str) {
        for c in text.chars() {
            state.handle(press(KeyCode::Char(c)), &[]);
        }
    }

    #[test]
    fn test_plain_reader_lines_then_eof() {
        let mut reader = PlainReader::new(Cursor::new("listDataSources\r\nsave\n"));
        assert_eq!(reader.read_line("", &[]).unwrap(), ReadOutcome::Line("listDataSources".into()));
        assert_eq!(reader.read_line("", &[]).unwrap(), ReadOutcome::Line("save".into()));
        assert_eq!(reader.read_line("", &[]).unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn test_editing_keys() {
        let mut state = LineState::default();
        type_text(&mut state, "getFeatur");
        state.handle(press(KeyCode::Home), &[]);
        type_text(&mut state, ">");
        state.handle(press(KeyCode::End), &[]);
        type_text(&mut state, "e");
        state.handle(press(KeyCode::Home), &[]);
        state.handle(press(KeyCode::Delete), &[]);
        assert_eq!(state.text(), "getFeature");

        state.handle(press(KeyCode::End), &[]);
        state.handle(press(KeyCode::Left), &[]);
        state.handle(press(KeyCode::Backspace), &[]);
        assert_eq!(state.text(), "getFeatue");
    }

    #[test]
    fn test_history_recall() {
        let history = vec!["listFeatures".to_string(), "getFeature NAME".to_string()];
        let mut state = LineState::default();
        type_text(&mut state, "draft");

        state.handle(press(KeyCode::Up), &history);
        assert_eq!(state.text(), "getFeature NAME");
        state.handle(press(KeyCode::Up), &history);
        state.handle(press(KeyCode::Up), &history);
        assert_eq!(state.text(), "listFeatures");
        state.handle(press(KeyCode::Down), &history);
        state.handle(press(KeyCode::Down), &history);
        assert_eq!(state.text(), "draft");
    }

    #[test]
    fn test_control_keys() {
        let mut state = LineState::default();
        assert!(matches!(state.handle(ctrl('d'), &[]), KeyAction::Eof));
        type_text(&mut state, "x");
        assert!(matches!(state.handle(ctrl('d'), &[]), KeyAction::Ignore));
        assert!(matches!(state.handle(ctrl('c'), &[]), KeyAction::Interrupt));
    }

    #[test]
    fn test_visible_width_skips_escapes() {
        assert_eq!(visible_width("\u{1b}[36m(szcfg) \u{1b}[0m"), 8);
    }
}

//! Message, table and JSON rendering.
//!
//! Everything here is pure: callers hand over already translated records
//! and get a string back. Colors go through [`colored`], so disabling them
//! with [`DisplayFormatter::set_color`] affects every string produced
//! afterwards.

use std::fmt;

use colored::{ColoredString, Colorize};
use serde_json::Value;
use szconfig::Record;

/// How list and record output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Bordered table.
    Table,
    /// Pretty printed JSON.
    Json,
    /// One compact JSON object per line.
    Jsonl,
}

impl OutputFormat {
    /// Recognise a format token, ignoring case.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::Jsonl),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Jsonl => "jsonl",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Bad,
    Good,
    Caution,
    Highlight,
    Attr,
    Dim,
    Text,
    Number,
}

fn paint(text: &str, style: Style) -> ColoredString {
    match style {
        Style::Bad => text.red(),
        Style::Good => text.green(),
        Style::Caution => text.yellow().italic(),
        Style::Highlight => text.cyan(),
        Style::Attr => text.cyan().bold(),
        Style::Dim => text.dimmed(),
        Style::Text => text.green(),
        Style::Number => text.yellow(),
    }
}

/// Renders messages and data for the shell.
#[derive(Debug, Clone)]
pub struct DisplayFormatter {
    color: bool,
}

impl DisplayFormatter {
    pub fn new(color: bool) -> Self {
        let mut formatter = Self { color };
        formatter.set_color(color);
        formatter
    }

    /// Turn colored output on or off for the whole process.
    pub fn set_color(&mut self, enabled: bool) {
        self.color = enabled;
        if enabled {
            colored::control::unset_override();
        } else {
            colored::control::set_override(false);
        }
    }

    /// Force colors on even when stdout is not a terminal.
    pub fn force_color(&mut self) {
        self.color = true;
        colored::control::set_override(true);
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    fn message(&self, text: String, style: Style) -> String {
        format!("\n{}\n", paint(&text, style))
    }

    pub fn error(&self, message: impl fmt::Display) -> String {
        self.message(format!("Error: {message}"), Style::Bad)
    }

    pub fn success(&self, message: impl fmt::Display) -> String {
        self.message(format!("Success: {message}"), Style::Good)
    }

    pub fn warning(&self, message: impl fmt::Display) -> String {
        self.message(format!("Warning: {message}"), Style::Caution)
    }

    pub fn info(&self, message: impl fmt::Display) -> String {
        self.message(format!("Info: {message}"), Style::Highlight)
    }

    /// A highlighted line without a prefix.
    pub fn highlight(&self, text: &str) -> String {
        paint(text, Style::Highlight).to_string()
    }

    /// Help for one topic: an upper-cased heading followed by `content`.
    pub fn help_topic(&self, topic: &str, content: &str) -> String {
        let header = paint(&format!("\n{}:", topic.to_uppercase()), Style::Highlight);
        format!("{header}\n{content}\n")
    }

    /// Render a list of records.
    pub fn records(&self, records: &[Record], format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.table(records),
            OutputFormat::Json => {
                let list = Value::Array(records.iter().cloned().map(Value::Object).collect());
                self.json(&list)
            }
            OutputFormat::Jsonl => jsonl(records.iter().map(|r| Value::Object(r.clone()))),
        }
    }

    /// Render a single value, usually one record.
    pub fn record(&self, value: &Value, format: OutputFormat) -> String {
        match (format, value) {
            (OutputFormat::Table, Value::Object(record)) => self.table(std::slice::from_ref(record)),
            (OutputFormat::Table, Value::Array(items)) if items.iter().all(Value::is_object) => {
                let records: Vec<Record> = items.iter().filter_map(|v| v.as_object().cloned()).collect();
                self.table(&records)
            }
            (OutputFormat::Jsonl, Value::Array(items)) => jsonl(items.iter().cloned()),
            (OutputFormat::Jsonl, other) => jsonl(std::iter::once(other.clone())),
            _ => self.json(value),
        }
    }

    /// Pretty JSON with colored keys and values.
    pub fn json(&self, value: &Value) -> String {
        let mut out = String::new();
        write_json(&mut out, value, 0);
        out
    }

    /// A bordered table with one column per field, in order of first
    /// appearance across the records.
    pub fn table(&self, records: &[Record]) -> String {
        if records.is_empty() {
            return "No data found".to_string();
        }
        let mut headers: Vec<&str> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !headers.contains(&key.as_str()) {
                    headers.push(key);
                }
            }
        }
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|record| headers.iter().map(|h| cell_text(record.get(*h))).collect())
            .collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let rule = |left: char, mid: char, right: char| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{left}{}{right}", segments.join(&mid.to_string()))
        };
        let line = |cells: Vec<String>, style: Style| {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    let pad = width - cell.chars().count();
                    format!(" {}{} ", paint(cell, style), " ".repeat(pad))
                })
                .collect();
            format!("│{}│", padded.join("│"))
        };

        let mut lines = vec![rule('┌', '┬', '┐')];
        lines.push(line(headers.iter().map(|h| h.to_string()).collect(), Style::Attr));
        for row in rows {
            lines.push(rule('├', '┼', '┤'));
            lines.push(line(row, Style::Dim));
        }
        lines.push(rule('└', '┴', '┘'));
        lines.join("\n")
    }
}

impl Default for DisplayFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn jsonl(values: impl Iterator<Item = Value>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join("\n")
}

fn write_json(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    let closing = "  ".repeat(depth);
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                let key_text = Value::String(key.clone()).to_string();
                out.push_str(&format!("{indent}{}: ", paint(&key_text, Style::Attr)));
                write_json(out, item, depth + 1);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&closing);
            out.push('}');
        }
        Value::Array(items) if !items.is_empty() => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                out.push_str(&indent);
                write_json(out, item, depth + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&closing);
            out.push(']');
        }
        Value::Object(_) => out.push_str("{}"),
        Value::Array(_) => out.push_str("[]"),
        Value::String(_) => out.push_str(&paint(&value.to_string(), Style::Text).to_string()),
        other => out.push_str(&paint(&other.to_string(), Style::Number).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn plain() -> DisplayFormatter {
        DisplayFormatter::new(false)
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_message_prefixes() {
        let display = plain();
        assert_eq!(display.error("boom"), "\nError: boom\n");
        assert_eq!(display.success("done"), "\nSuccess: done\n");
        assert_eq!(display.warning("careful"), "\nWarning: careful\n");
        assert_eq!(display.info("fyi"), "\nInfo: fyi\n");
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("jsonl"), Some(OutputFormat::Jsonl));
        assert_eq!(OutputFormat::parse("Table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_table_layout() {
        let records = vec![
            record(json!({"id": 1, "dataSource": "TEST"})),
            record(json!({"id": 1000, "dataSource": "CUSTOMER", "tags": ["a"]})),
        ];
        let table = plain().table(&records);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "┌──────┬────────────┬───────┐");
        assert_eq!(lines[1], "│ id   │ dataSource │ tags  │");
        assert_eq!(lines[3], "│ 1    │ TEST       │       │");
        assert_eq!(lines[5], "│ 1000 │ CUSTOMER   │ [\"a\"] │");
        assert_eq!(lines.last(), Some(&"└──────┴────────────┴───────┘"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(plain().table(&[]), "No data found");
    }

    #[test]
    fn test_json_matches_pretty_printer() {
        let value = json!({"feature": "NAME", "elementList": [{"element": "FULL_NAME"}], "empty": {}});
        assert_eq!(plain().json(&value), serde_json::to_string_pretty(&value).unwrap());
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let records = vec![record(json!({"id": 1})), record(json!({"id": 2}))];
        assert_eq!(plain().records(&records, OutputFormat::Jsonl), "{\"id\":1}\n{\"id\":2}");
    }

    #[test]
    fn test_help_topic_heading() {
        assert_eq!(plain().help_topic("save", "body"), "\nSAVE:\nbody\n");
    }
}

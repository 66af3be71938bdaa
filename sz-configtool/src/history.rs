//! Persistent command history.
//!
//! One command per line in a plain text file, bounded to the most recent
//! [`MAX_ENTRIES`] commands.

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Number of commands kept in memory and on disk.
pub const MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    path: Option<PathBuf>,
    enabled: bool,
}

impl History {
    /// History backed by `path`. A missing or unreadable file starts empty.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut entries: Vec<String> = match fs::read_to_string(path) {
            Ok(text) => text.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect(),
            Err(e) => {
                debug!("no history loaded from {}: {e}", path.display());
                Vec::new()
            }
        };
        let excess = entries.len().saturating_sub(MAX_ENTRIES);
        entries.drain(..excess);
        Self {
            entries,
            path: Some(path.to_path_buf()),
            enabled: true,
        }
    }

    /// History kept for the session only.
    pub fn in_memory() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// No history at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Record a command and persist the history file.
    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if !self.enabled || line.is_empty() {
            return;
        }
        if self.entries.last().is_some_and(|last| last == line) {
            return;
        }
        self.entries.push(line.to_string());
        if self.entries.len() > MAX_ENTRIES {
            self.entries.remove(0);
        }
        self.save();
    }

    /// The last `count` commands with their 1-based position.
    pub fn recent(&self, count: usize) -> Vec<(usize, &str)> {
        let start = self.entries.len().saturating_sub(count);
        self.entries[start..]
            .iter()
            .enumerate()
            .map(|(i, entry)| (start + i + 1, entry.as_str()))
            .collect()
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let mut text = self.entries.join("\n");
        text.push('\n');
        if let Err(e) = fs::write(path, text) {
            warn!("failed to write history file {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");

        let mut history = History::load(&path);
        history.add("listDataSources");
        history.add("addDataSource CUSTOMER");
        history.add("addDataSource CUSTOMER");

        let reloaded = History::load(&path);
        assert_eq!(reloaded.entries(), ["listDataSources", "addDataSource CUSTOMER"]);
    }

    #[test]
    fn test_history_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let mut history = History::load(&path);
        for i in 0..MAX_ENTRIES + 5 {
            history.add(&format!("getFeature {i}"));
        }

        assert_eq!(history.len(), MAX_ENTRIES);
        assert_eq!(history.entries()[0], "getFeature 5");
        assert_eq!(History::load(&path).len(), MAX_ENTRIES);
    }

    #[test]
    fn test_recent_numbering() {
        let mut history = History::in_memory();
        for verb in ["a", "b", "c"] {
            history.add(verb);
        }
        assert_eq!(history.recent(2), vec![(2, "b"), (3, "c")]);
        assert_eq!(history.recent(20).len(), 3);
    }

    #[test]
    fn test_disabled_history_ignores_commands() {
        let mut history = History::disabled();
        history.add("save");
        assert!(!history.is_enabled());
        assert!(history.is_empty());
    }
}

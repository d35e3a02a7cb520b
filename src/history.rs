//! Command history for dockterm
//!
//! A bounded most-recent-first ring of submitted commands with a recall
//! cursor for ArrowUp/ArrowDown navigation. History is per widget instance
//! and in-memory only.

use std::collections::VecDeque;

/// Maximum number of history entries
pub const HISTORY_LIMIT: usize = 100;

/// Effect of moving the recall cursor towards newer entries.
#[derive(Debug, PartialEq, Eq)]
pub enum Recall<'a> {
    /// Replace the input with this entry.
    Entry(&'a str),
    /// Back at a fresh line; clear the input.
    Fresh,
}

/// Bounded command history, newest first.
pub struct CommandHistory {
    entries: VecDeque<String>,
    /// Recall cursor; -1 means "editing a fresh line".
    cursor: isize,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_LIMIT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: -1,
            capacity,
        }
    }

    /// Push a submitted command to the front, evicting the oldest entry
    /// past capacity. Resets the recall cursor. Whitespace-only commands
    /// are ignored.
    pub fn push(&mut self, command: &str) {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return;
        }
        self.entries.push_front(trimmed.to_string());
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        self.cursor = -1;
    }

    /// Move the cursor one step towards older entries. Bounded at the
    /// oldest entry; `None` means the input should stay as it is.
    pub fn recall_older(&mut self) -> Option<&str> {
        if self.cursor + 1 < self.entries.len() as isize {
            self.cursor += 1;
            self.entries.get(self.cursor as usize).map(|s| s.as_str())
        } else {
            None
        }
    }

    /// Move the cursor one step towards newer entries. At cursor 0 (or
    /// already fresh) this resets to -1.
    pub fn recall_newer(&mut self) -> Recall<'_> {
        if self.cursor > 0 {
            self.cursor -= 1;
            match self.entries.get(self.cursor as usize) {
                Some(entry) => Recall::Entry(entry),
                None => Recall::Fresh,
            }
        } else {
            self.cursor = -1;
            Recall::Fresh
        }
    }

    #[allow(dead_code)]
    pub fn cursor(&self) -> isize {
        self.cursor
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries newest first.
    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_last_100_newest_first() {
        let mut history = CommandHistory::new();
        for i in 0..105 {
            history.push(&format!("cmd{i}"));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        let entries: Vec<&str> = history.iter().collect();
        assert_eq!(entries[0], "cmd104");
        assert_eq!(entries[99], "cmd5");
    }

    #[test]
    fn test_blank_commands_ignored() {
        let mut history = CommandHistory::new();
        history.push("");
        history.push("   ");
        assert!(history.is_empty());

        history.push("  ls  ");
        assert_eq!(history.iter().next(), Some("ls"));
    }

    #[test]
    fn test_recall_older_is_bounded() {
        let mut history = CommandHistory::new();
        history.push("first");
        history.push("second");

        assert_eq!(history.recall_older(), Some("second"));
        assert_eq!(history.recall_older(), Some("first"));
        // At the oldest entry already
        assert_eq!(history.recall_older(), None);
        assert_eq!(history.cursor(), 1);
    }

    #[test]
    fn test_recall_newer_returns_to_fresh_line() {
        let mut history = CommandHistory::new();
        history.push("first");
        history.push("second");

        history.recall_older();
        history.recall_older();
        assert_eq!(history.recall_newer(), Recall::Entry("second"));
        assert_eq!(history.recall_newer(), Recall::Fresh);
        assert_eq!(history.cursor(), -1);
        // Down on a fresh line still clears
        assert_eq!(history.recall_newer(), Recall::Fresh);
    }

    #[test]
    fn test_push_resets_cursor() {
        let mut history = CommandHistory::new();
        history.push("first");
        history.recall_older();
        assert_eq!(history.cursor(), 0);

        history.push("second");
        assert_eq!(history.cursor(), -1);
        assert_eq!(history.recall_older(), Some("second"));
    }

    #[test]
    fn test_recall_empty_history() {
        let mut history = CommandHistory::new();
        assert_eq!(history.recall_older(), None);
        assert_eq!(history.recall_newer(), Recall::Fresh);
    }
}

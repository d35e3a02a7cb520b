//! Append-only output pane with content-based classification.

use super::ansi;

/// Display classification of an output fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputClass {
    /// Plain command output
    Output,
    /// Error text
    Error,
    /// Warning text
    Warning,
    /// Success text
    Success,
    /// Locally echoed prompt line
    Prompt,
    /// Informational client message
    Info,
}

/// Classify a fragment by its content. Rules are checked in fixed order and
/// the first match wins.
pub fn classify(text: &str) -> OutputClass {
    let lower = text.to_lowercase();
    if lower.contains("error") {
        OutputClass::Error
    } else if lower.contains("warn") {
        OutputClass::Warning
    } else if lower.contains("success") || text.contains('✓') {
        OutputClass::Success
    } else if has_prompt_prefix(text) {
        OutputClass::Prompt
    } else {
        OutputClass::Output
    }
}

/// Matches the `user@host:` prefix pattern (`^[\w-]+@[\w-]+:`).
/// Word characters are ASCII only.
fn has_prompt_prefix(text: &str) -> bool {
    fn word_len(s: &str) -> usize {
        s.char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
            .map(|(i, _)| i)
            .unwrap_or(s.len())
    }

    let user = word_len(text);
    if user == 0 {
        return false;
    }
    let Some(rest) = text[user..].strip_prefix('@') else {
        return false;
    };
    let host = word_len(rest);
    host > 0 && rest[host..].starts_with(':')
}

/// One rendered fragment. Immutable once appended; a fragment may span
/// multiple display rows when its text contains newlines.
#[derive(Clone, Debug)]
pub struct OutputLine {
    pub text: String,
    pub class: OutputClass,
}

/// The output pane: an append-only sequence of classified fragments.
#[derive(Default)]
pub struct OutputPane {
    lines: Vec<OutputLine>,
}

impl OutputPane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip SGR escapes, classify (unless a class is given) and append.
    pub fn append(&mut self, text: &str, class: Option<OutputClass>) {
        let text = ansi::strip_sgr(text);
        let class = class.unwrap_or_else(|| classify(&text));
        self.lines.push(OutputLine { text, class });
    }

    /// Discard the whole pane. Individual fragments are never removed.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Flatten fragments into display rows, splitting embedded newlines.
    /// A trailing newline does not produce an empty row.
    pub fn display_rows(&self) -> Vec<(&str, OutputClass)> {
        let mut rows = Vec::new();
        for line in &self.lines {
            let text = line.text.strip_suffix('\n').unwrap_or(&line.text);
            if text.is_empty() {
                rows.push(("", line.class));
                continue;
            }
            for row in text.split('\n') {
                rows.push((row, line.class));
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error_first() {
        assert_eq!(classify("some ERROR occurred"), OutputClass::Error);
        // "error" outranks "warning" when both are present
        assert_eq!(classify("warning: error in file"), OutputClass::Error);
    }

    #[test]
    fn test_classify_warning() {
        assert_eq!(classify("WARN: disk almost full"), OutputClass::Warning);
        assert_eq!(classify("a Warning was issued"), OutputClass::Warning);
    }

    #[test]
    fn test_classify_success() {
        assert_eq!(classify("build Success"), OutputClass::Success);
        assert_eq!(classify("✓ all tests passed"), OutputClass::Success);
    }

    #[test]
    fn test_classify_prompt_prefix() {
        assert_eq!(classify("root@web-1:~$ ls"), OutputClass::Prompt);
        assert_eq!(classify("my_user@host:"), OutputClass::Prompt);
        // substring rules outrank the prompt pattern
        assert_eq!(classify("root@web:~$ make error"), OutputClass::Error);
    }

    #[test]
    fn test_classify_plain_output() {
        assert_eq!(classify("file1\nfile2\n"), OutputClass::Output);
        assert_eq!(classify("@host: no user part"), OutputClass::Output);
        assert_eq!(classify("user@: no host part"), OutputClass::Output);
    }

    #[test]
    fn test_prompt_prefix_is_ascii_only() {
        assert_eq!(classify("café@host: hi"), OutputClass::Output);
        assert_eq!(classify("user@hôst: hi"), OutputClass::Output);
        assert_eq!(classify("юзер@host: hi"), OutputClass::Output);
    }

    #[test]
    fn test_append_strips_and_classifies() {
        let mut pane = OutputPane::new();
        pane.append("\x1b[31mERROR: boom\x1b[0m", None);

        let lines = pane.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ERROR: boom");
        assert_eq!(lines[0].class, OutputClass::Error);
    }

    #[test]
    fn test_explicit_class_wins() {
        let mut pane = OutputPane::new();
        pane.append("error text echoed on purpose", Some(OutputClass::Prompt));
        assert_eq!(pane.lines()[0].class, OutputClass::Prompt);
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut pane = OutputPane::new();
        pane.append("one", None);
        pane.append("two", None);
        pane.clear();
        assert!(pane.lines().is_empty());
    }

    #[test]
    fn test_display_rows_split_on_newlines() {
        let mut pane = OutputPane::new();
        pane.append("file1\nfile2\n", None);
        pane.append("root@web:~$ ", Some(OutputClass::Prompt));

        let rows = pane.display_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ("file1", OutputClass::Output));
        assert_eq!(rows[1], ("file2", OutputClass::Output));
        assert_eq!(rows[2], ("root@web:~$ ", OutputClass::Prompt));
    }
}

//! Prefix autocomplete against a fixed builtin command list.

/// Commands offered for Tab completion, in presentation order.
pub const BUILTIN_COMMANDS: &[&str] = &[
    "ls", "cd", "pwd", "cat", "nano", "vim", "mkdir", "rmdir", "rm", "cp", "mv", "chmod",
    "chown", "ps", "top", "htop", "df", "du", "free", "uname", "whoami", "date", "history",
    "clear", "exit", "help",
];

/// Outcome of a completion attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// Nothing starts with the prefix; leave the input alone.
    NoMatch,
    /// Exactly one candidate; replace the input with it.
    Single(&'static str),
    /// Several candidates; list them, keep the input unchanged.
    Multiple(Vec<&'static str>),
}

/// Match builtin commands by prefix.
pub fn complete(prefix: &str) -> Completion {
    let matches: Vec<&'static str> = BUILTIN_COMMANDS
        .iter()
        .copied()
        .filter(|cmd| cmd.starts_with(prefix))
        .collect();

    match matches.len() {
        0 => Completion::NoMatch,
        1 => Completion::Single(matches[0]),
        _ => Completion::Multiple(matches),
    }
}

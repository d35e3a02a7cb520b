//! SGR escape sequence stripping.
//!
//! Removes color and style sequences (ESC `[` params `m`) before text is
//! rendered. Cursor movement and screen-clear sequences pass through
//! unmodified; full-screen programs are out of scope for this client.

/// Strip SGR sequences from `text`. Everything else is preserved verbatim,
/// including other escape sequences and lone ESC bytes.
pub fn strip_sgr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('\x1b') {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);

        if let Some(after) = tail.strip_prefix("\x1b[") {
            let end = after
                .find(|c: char| !(c.is_ascii_digit() || c == ';'))
                .unwrap_or(after.len());
            if after[end..].starts_with('m') {
                rest = &after[end + 1..];
                continue;
            }
        }
        // Not an SGR sequence, keep the ESC and move on.
        out.push('\x1b');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_color_sequences() {
        assert_eq!(strip_sgr("\x1b[31mfoo\x1b[0m"), "foo");
        assert_eq!(strip_sgr("\x1b[1;32;40mbar\x1b[m"), "bar");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_sgr("hello world\n"), "hello world\n");
        assert_eq!(strip_sgr(""), "");
    }

    #[test]
    fn test_non_sgr_sequences_preserved() {
        // Screen clear and cursor moves are not interpreted, not removed.
        assert_eq!(strip_sgr("\x1b[2Jfoo"), "\x1b[2Jfoo");
        assert_eq!(strip_sgr("\x1b[10;20Hfoo"), "\x1b[10;20Hfoo");
    }

    #[test]
    fn test_lone_escape_preserved() {
        assert_eq!(strip_sgr("a\x1bz"), "a\x1bz");
        assert_eq!(strip_sgr("trailing\x1b"), "trailing\x1b");
        assert_eq!(strip_sgr("trailing\x1b["), "trailing\x1b[");
    }

    #[test]
    fn test_mixed_content() {
        assert_eq!(
            strip_sgr("ok \x1b[32m✓\x1b[0m done\n"),
            "ok ✓ done\n"
        );
    }
}

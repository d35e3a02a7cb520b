//! Session renderer using crossterm
//!
//! Full-frame redraw of the widget: optional status bar on the top row, the
//! tail of the output pane below it, and the prompt/input line at the
//! bottom. The pane is always pinned to its newest content.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute, queue,
    style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::channel::StatusReport;
use crate::config::ColorScheme;
use crate::core::client::SessionState;

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self { initialized: false }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableBracketedPaste,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.initialized = true;
        Ok(())
    }

    /// Restore the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            DisableBracketedPaste,
            ResetColor,
            LeaveAlternateScreen,
            Show
        )?;
        terminal::disable_raw_mode()?;
        self.initialized = false;
        Ok(())
    }

    /// Draw one frame of the widget.
    pub fn draw(
        &mut self,
        state: &SessionState,
        scheme: &ColorScheme,
        status_visible: bool,
    ) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        if cols == 0 || rows < 2 {
            return Ok(());
        }
        let mut stdout = io::stdout();
        queue!(stdout, Hide, Clear(ClearType::All))?;

        let status_rows: u16 = if status_visible { 1 } else { 0 };
        let input_row = rows - 1;
        let pane_rows = rows.saturating_sub(1 + status_rows) as usize;

        if status_visible {
            draw_status(&mut stdout, state.status.as_ref(), scheme, cols)?;
        }

        // Output pane, pinned to the newest rows.
        let display = state.pane.display_rows();
        let skip = display.len().saturating_sub(pane_rows);
        for (i, (text, class)) in display[skip..].iter().enumerate() {
            queue!(
                stdout,
                MoveTo(0, status_rows + i as u16),
                SetForegroundColor(scheme.class_color(*class).to_crossterm()),
                Print(truncate_to_width(text, cols as usize))
            )?;
        }

        // Prompt and input line.
        let prompt = state.prompt();
        queue!(
            stdout,
            MoveTo(0, input_row),
            SetForegroundColor(scheme.prompt.to_crossterm()),
            Print(truncate_to_width(&prompt, cols as usize)),
        )?;
        let prompt_width = UnicodeWidthStr::width(prompt.as_str());
        let remaining = (cols as usize).saturating_sub(prompt_width);
        queue!(
            stdout,
            SetForegroundColor(scheme.output.to_crossterm()),
            Print(truncate_to_width(state.input.as_str(), remaining)),
        )?;

        let caret: usize = state
            .input
            .as_str()
            .chars()
            .take(state.input.cursor())
            .map(|ch| ch.width().unwrap_or(0))
            .sum();
        let caret_col = (prompt_width + caret).min(cols as usize - 1) as u16;
        queue!(stdout, MoveTo(caret_col, input_row), Show)?;
        stdout.flush()
    }
}

fn draw_status(
    stdout: &mut impl Write,
    status: Option<&StatusReport>,
    scheme: &ColorScheme,
    cols: u16,
) -> io::Result<()> {
    queue!(
        stdout,
        MoveTo(0, 0),
        SetBackgroundColor(scheme.status_bar_bg.to_crossterm()),
        SetForegroundColor(scheme.status_bar_fg.to_crossterm()),
        Print(" ".repeat(cols as usize)),
        MoveTo(0, 0)
    )?;

    match status {
        None => queue!(stdout, Print(" connecting..."))?,
        Some(status) => {
            let docker_color = if status.docker == "up" {
                scheme.status_ok
            } else {
                scheme.status_bad
            };
            queue!(
                stdout,
                SetForegroundColor(docker_color.to_crossterm()),
                Print(format!(" Docker: {}", status.docker))
            )?;
            if let Some(error) = &status.error {
                queue!(
                    stdout,
                    SetForegroundColor(scheme.status_bad.to_crossterm()),
                    Print(format!(" ({error})"))
                )?;
            }

            let (container_text, container_color) = match status.container.as_str() {
                "present" if status.container_running == Some(true) => {
                    let text = match &status.image {
                        Some(image) => format!("Container: running (image={image})"),
                        None => "Container: running".to_string(),
                    };
                    (text, scheme.status_ok)
                }
                "present" => ("Container: stopped".to_string(), scheme.status_warn),
                "missing" => ("Container: missing".to_string(), scheme.status_bad),
                _ => ("Container: unknown".to_string(), scheme.status_bar_fg),
            };
            queue!(
                stdout,
                SetForegroundColor(scheme.status_bar_fg.to_crossterm()),
                Print("  |  "),
                SetForegroundColor(container_color.to_crossterm()),
                Print(container_text)
            )?;
        }
    }
    queue!(stdout, ResetColor)?;
    Ok(())
}

/// Clip `text` to at most `max` display columns. Carriage returns are
/// dropped; the pane splits rows on newlines before this is called.
fn truncate_to_width(text: &str, max: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        if ch == '\r' {
            continue;
        }
        let w = ch.width().unwrap_or(0);
        if width + w > max {
            break;
        }
        width += w;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("a\rb", 10), "ab");
        // Wide characters count as two columns
        assert_eq!(truncate_to_width("日本語", 4), "日本");
    }
}

//! Terminal session client
//!
//! Bridges keyboard input and the realtime channel to the remote command
//! service, rendering the service's streamed output into the pane. The
//! connection handle is injected by the hosting application; the client owns
//! a token for every subscription it makes and drops them all before
//! resubscribing, so calling [`SessionClient::start`] repeatedly never
//! duplicates handlers or rendered output.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use thiserror::Error;
use tracing::{debug, warn};

use crate::channel::{
    Connection, StartRequest, StatusReport, SubscriptionToken, TextData, EV_COMMAND_RESULT,
    EV_COMMAND_STARTED, EV_DISCONNECT, EV_HISTORY_FULL, EV_TERMINAL_INPUT, EV_TERMINAL_OUTPUT,
    EV_TERMINAL_START, EV_TERMINAL_STATUS,
};
use crate::complete::{self, Completion};
use crate::core::pane::{OutputClass, OutputPane};
use crate::history::{CommandHistory, Recall};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("session target must not be empty")]
    EmptyTarget,
}

/// Single-line input field with a character cursor.
#[derive(Default)]
pub struct InputLine {
    buffer: String,
    /// Cursor position in characters.
    cursor: usize,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }

    pub fn insert(&mut self, ch: char) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, ch);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.buffer.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.buffer.chars().count() {
            let at = self.byte_index(self.cursor);
            self.buffer.remove(at);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        if self.cursor < self.buffer.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.buffer.chars().count();
    }

    /// Replace the contents, cursor at the end.
    pub fn set(&mut self, text: &str) {
        self.buffer = text.to_string();
        self.cursor = self.buffer.chars().count();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Take the contents, leaving an empty field.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }
}

/// Widget state shared between the client and the renderer.
pub struct SessionState {
    pub target: String,
    pub current_user: String,
    pub current_path: String,
    pub pane: OutputPane,
    pub input: InputLine,
    pub history: CommandHistory,
    /// Latest `terminal_status` report, if any.
    pub status: Option<StatusReport>,
    /// Set once the loss line has been rendered; keeps it to one line.
    connection_lost: bool,
}

impl SessionState {
    /// The prompt string shown before the input, `user@target:path$ `.
    pub fn prompt(&self) -> String {
        format!(
            "{}@{}:{}$ ",
            self.current_user, self.target, self.current_path
        )
    }

    fn note_connection_lost(&mut self) {
        if self.connection_lost {
            return;
        }
        self.connection_lost = true;
        self.pane.append(
            "[Connection lost. Restart dockterm to reconnect]",
            Some(OutputClass::Error),
        );
    }
}

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user: String,
    pub path: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            path: "~".to_string(),
        }
    }
}

/// The terminal session client.
pub struct SessionClient {
    conn: Rc<Connection>,
    state: Rc<RefCell<SessionState>>,
    tokens: Vec<SubscriptionToken>,
}

impl SessionClient {
    pub fn new(conn: Rc<Connection>, target: impl Into<String>, opts: SessionOptions) -> Self {
        let state = SessionState {
            target: target.into(),
            current_user: opts.user,
            current_path: opts.path,
            pane: OutputPane::new(),
            input: InputLine::new(),
            history: CommandHistory::new(),
            status: None,
            connection_lost: false,
        };
        Self {
            conn,
            state: Rc::new(RefCell::new(state)),
            tokens: Vec::new(),
        }
    }

    /// Borrow the widget state (for rendering).
    pub fn state(&self) -> Ref<'_, SessionState> {
        self.state.borrow()
    }

    /// Attach to the target: (re)register one handler per inbound event,
    /// emit the session-start request and append a local connected line.
    ///
    /// Safe to call repeatedly against the same connection; prior
    /// subscriptions are dropped first.
    pub fn start(&mut self) -> Result<(), ClientError> {
        let target = self.state.borrow().target.clone();
        if target.trim().is_empty() {
            return Err(ClientError::EmptyTarget);
        }

        for token in self.tokens.drain(..) {
            self.conn.unsubscribe(token);
        }

        let state = Rc::clone(&self.state);
        self.tokens.push(self.conn.subscribe(
            EV_TERMINAL_OUTPUT,
            Box::new(move |payload| {
                match serde_json::from_value::<TextData>(payload.clone()) {
                    Ok(output) => state.borrow_mut().pane.append(&output.data, None),
                    Err(err) => warn!("malformed terminal_output payload: {err}"),
                }
            }),
        ));

        let state = Rc::clone(&self.state);
        self.tokens.push(self.conn.subscribe(
            EV_TERMINAL_STATUS,
            Box::new(move |payload| {
                match serde_json::from_value::<StatusReport>(payload.clone()) {
                    Ok(report) => state.borrow_mut().status = Some(report),
                    Err(err) => warn!("malformed terminal_status payload: {err}"),
                }
            }),
        ));

        // Observed for diagnostics only; no behavior is attached.
        for event in [EV_COMMAND_STARTED, EV_COMMAND_RESULT, EV_HISTORY_FULL] {
            self.tokens.push(self.conn.subscribe(
                event,
                Box::new(move |payload| debug!("{event}: {payload}")),
            ));
        }

        let state = Rc::clone(&self.state);
        self.tokens.push(self.conn.subscribe(
            EV_DISCONNECT,
            Box::new(move |_| state.borrow_mut().note_connection_lost()),
        ));

        match self.conn.emit(
            EV_TERMINAL_START,
            &StartRequest {
                container_id: target.clone(),
            },
        ) {
            Ok(()) => self
                .state
                .borrow_mut()
                .pane
                .append(&format!("Connected to {target}"), Some(OutputClass::Info)),
            Err(err) => {
                warn!("failed to request session start: {err}");
                self.state.borrow_mut().note_connection_lost();
            }
        }
        Ok(())
    }

    /// Submit the current input: the one shared operation behind both the
    /// Enter key and any programmatic send. The input field is always
    /// cleared, even when nothing is sent.
    pub fn submit(&mut self) {
        let raw = self.state.borrow_mut().input.take();
        let command = raw.trim().to_string();
        if command.is_empty() {
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            state.history.push(&command);
            let echo = format!("{}{}", state.prompt(), command);
            state.pane.append(&echo, Some(OutputClass::Prompt));
        }

        if self.conn.is_connected() {
            if let Err(err) = self
                .conn
                .emit(EV_TERMINAL_INPUT, &TextData { data: command })
            {
                warn!("failed to send command: {err}");
            }
        } else {
            warn!("channel disconnected, command dropped");
        }
    }

    /// Insert pasted text into the input field.
    pub fn insert_text(&mut self, text: &str) {
        self.state.borrow_mut().input.insert_str(text);
    }

    /// Handle one key event. Returns true when the event was consumed and
    /// the widget needs a redraw.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if event.kind == KeyEventKind::Release {
            return false;
        }
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);

        match event.code {
            KeyCode::Enter => {
                self.submit();
                true
            }
            KeyCode::Up => {
                let mut state = self.state.borrow_mut();
                let SessionState { history, input, .. } = &mut *state;
                if let Some(entry) = history.recall_older() {
                    input.set(entry);
                }
                true
            }
            KeyCode::Down => {
                let mut state = self.state.borrow_mut();
                let SessionState { history, input, .. } = &mut *state;
                match history.recall_newer() {
                    Recall::Entry(entry) => input.set(entry),
                    Recall::Fresh => input.clear(),
                }
                true
            }
            KeyCode::Tab => {
                self.autocomplete();
                true
            }
            KeyCode::Char('l') if ctrl => {
                self.clear_pane();
                true
            }
            KeyCode::Char('v') if ctrl => {
                self.paste_clipboard();
                true
            }
            KeyCode::Char(ch) if !ctrl => {
                self.state.borrow_mut().input.insert(ch);
                true
            }
            KeyCode::Backspace => {
                self.state.borrow_mut().input.backspace();
                true
            }
            KeyCode::Delete => {
                self.state.borrow_mut().input.delete();
                true
            }
            KeyCode::Left => {
                self.state.borrow_mut().input.left();
                true
            }
            KeyCode::Right => {
                self.state.borrow_mut().input.right();
                true
            }
            KeyCode::Home => {
                self.state.borrow_mut().input.home();
                true
            }
            KeyCode::End => {
                self.state.borrow_mut().input.end();
                true
            }
            _ => false,
        }
    }

    /// Tab completion against the builtin command list. A unique match
    /// replaces the input; several matches are listed and the partial
    /// input stays untouched.
    fn autocomplete(&mut self) {
        let partial = self.state.borrow().input.as_str().to_string();
        match complete::complete(&partial) {
            Completion::NoMatch => {}
            Completion::Single(command) => {
                self.state.borrow_mut().input.set(&format!("{command} "));
            }
            Completion::Multiple(matches) => {
                let mut state = self.state.borrow_mut();
                state.pane.append(
                    &format!("Available commands: {}", matches.join(", ")),
                    Some(OutputClass::Info),
                );
                let echo = format!("{}{}", state.prompt(), partial);
                state.pane.append(&echo, Some(OutputClass::Prompt));
            }
        }
    }

    /// Ctrl+L: discard the pane and note it.
    fn clear_pane(&mut self) {
        let mut state = self.state.borrow_mut();
        state.pane.clear();
        state.pane.append("Terminal cleared", Some(OutputClass::Info));
    }

    fn paste_clipboard(&mut self) {
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
            Ok(text) => self.insert_text(&text),
            Err(err) => debug!("clipboard paste unavailable: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ServiceEndpoint;

    fn press(client: &mut SessionClient, code: KeyCode) {
        client.handle_key(&KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn press_ctrl(client: &mut SessionClient, ch: char) {
        client.handle_key(&KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
    }

    fn type_str(client: &mut SessionClient, text: &str) {
        for ch in text.chars() {
            press(client, KeyCode::Char(ch));
        }
    }

    fn started_client(target: &str) -> (SessionClient, Rc<Connection>, ServiceEndpoint) {
        let (conn, endpoint) = Connection::pair();
        let conn = Rc::new(conn);
        let mut client = SessionClient::new(Rc::clone(&conn), target, SessionOptions::default());
        client.start().unwrap();
        (client, conn, endpoint)
    }

    #[test]
    fn test_start_rejects_empty_target() {
        let (conn, _endpoint) = Connection::pair();
        let mut client = SessionClient::new(Rc::new(conn), "", SessionOptions::default());
        assert!(matches!(client.start(), Err(ClientError::EmptyTarget)));
    }

    #[test]
    fn test_submit_end_to_end() {
        let (mut client, conn, endpoint) = started_client("test");

        type_str(&mut client, "ls");
        press(&mut client, KeyCode::Enter);

        // Outbound: the start request, then the command.
        let start = endpoint.try_recv().unwrap();
        assert_eq!(start.name, EV_TERMINAL_START);
        assert_eq!(start.payload["container_id"], "test");

        let input = endpoint.try_recv().unwrap();
        assert_eq!(input.name, EV_TERMINAL_INPUT);
        assert_eq!(input.payload["data"], "ls");

        // Local prompt echo, input cleared.
        {
            let state = client.state();
            let lines = state.pane.lines();
            let echo = lines.last().unwrap();
            assert_eq!(echo.text, "root@test:~$ ls");
            assert_eq!(echo.class, OutputClass::Prompt);
            assert!(state.input.is_empty());
        }

        // Inbound output renders verbatim as plain output.
        endpoint
            .send(
                EV_TERMINAL_OUTPUT,
                &TextData {
                    data: "file1\nfile2\n".to_string(),
                },
            )
            .unwrap();
        conn.dispatch_pending();

        let state = client.state();
        let last = state.pane.lines().last().unwrap();
        assert_eq!(last.text, "file1\nfile2\n");
        assert_eq!(last.class, OutputClass::Output);
    }

    #[test]
    fn test_repeated_start_renders_each_event_once() {
        let (mut client, conn, endpoint) = started_client("test");
        client.start().unwrap();

        endpoint
            .send(
                EV_TERMINAL_OUTPUT,
                &TextData {
                    data: "hello".to_string(),
                },
            )
            .unwrap();
        conn.dispatch_pending();

        let state = client.state();
        let hits = state
            .pane
            .lines()
            .iter()
            .filter(|line| line.text == "hello")
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_whitespace_submit_clears_field_without_sending() {
        let (mut client, _conn, endpoint) = started_client("test");
        endpoint.try_recv(); // drop the start request

        type_str(&mut client, "   ");
        press(&mut client, KeyCode::Enter);

        assert!(client.state().input.is_empty());
        assert!(endpoint.try_recv().is_none());
        assert!(client.state().history.is_empty());
    }

    #[test]
    fn test_history_recall_navigation() {
        let (mut client, _conn, _endpoint) = started_client("test");

        type_str(&mut client, "first");
        press(&mut client, KeyCode::Enter);
        type_str(&mut client, "second");
        press(&mut client, KeyCode::Enter);

        press(&mut client, KeyCode::Up);
        assert_eq!(client.state().input.as_str(), "second");
        press(&mut client, KeyCode::Up);
        assert_eq!(client.state().input.as_str(), "first");
        // Bounded at the oldest entry
        press(&mut client, KeyCode::Up);
        assert_eq!(client.state().input.as_str(), "first");

        press(&mut client, KeyCode::Down);
        assert_eq!(client.state().input.as_str(), "second");
        press(&mut client, KeyCode::Down);
        assert_eq!(client.state().input.as_str(), "");
        assert_eq!(client.state().history.cursor(), -1);
    }

    #[test]
    fn test_tab_unique_match_completes_with_space() {
        let (mut client, _conn, _endpoint) = started_client("test");

        type_str(&mut client, "ps");
        press(&mut client, KeyCode::Tab);
        assert_eq!(client.state().input.as_str(), "ps ");
    }

    #[test]
    fn test_tab_ambiguous_match_lists_and_keeps_input() {
        let (mut client, _conn, _endpoint) = started_client("test");

        type_str(&mut client, "h");
        press(&mut client, KeyCode::Tab);

        let state = client.state();
        assert_eq!(state.input.as_str(), "h");

        let lines = state.pane.lines();
        let info = &lines[lines.len() - 2];
        assert_eq!(info.class, OutputClass::Info);
        assert!(info.text.contains("help"));
        assert!(info.text.contains("history"));

        let echo = &lines[lines.len() - 1];
        assert_eq!(echo.class, OutputClass::Prompt);
        assert_eq!(echo.text, "root@test:~$ h");
    }

    #[test]
    fn test_ctrl_l_clears_pane() {
        let (mut client, conn, endpoint) = started_client("test");
        endpoint
            .send(
                EV_TERMINAL_OUTPUT,
                &TextData {
                    data: "noise\n".to_string(),
                },
            )
            .unwrap();
        conn.dispatch_pending();

        press_ctrl(&mut client, 'l');

        let state = client.state();
        let lines = state.pane.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Terminal cleared");
        assert_eq!(lines[0].class, OutputClass::Info);
    }

    #[test]
    fn test_disconnect_renders_error_and_drops_sends() {
        let (mut client, conn, endpoint) = started_client("test");
        drop(endpoint);
        conn.dispatch_pending();

        {
            let state = client.state();
            let last = state.pane.lines().last().unwrap();
            assert_eq!(last.class, OutputClass::Error);
            assert!(last.text.contains("Connection lost"));
        }

        // Echoed locally but silently dropped on the wire; no panic.
        type_str(&mut client, "ls");
        press(&mut client, KeyCode::Enter);

        let state = client.state();
        let last = state.pane.lines().last().unwrap();
        assert_eq!(last.text, "root@test:~$ ls");
        assert!(state.input.is_empty());
    }

    #[test]
    fn test_start_on_dead_channel_reports_loss_not_connected() {
        let (conn, endpoint) = Connection::pair();
        drop(endpoint);
        let conn = Rc::new(conn);
        let mut client = SessionClient::new(Rc::clone(&conn), "test", SessionOptions::default());
        client.start().unwrap();

        {
            let state = client.state();
            assert!(!state
                .pane
                .lines()
                .iter()
                .any(|line| line.text.starts_with("Connected to")));
            let last = state.pane.lines().last().unwrap();
            assert_eq!(last.class, OutputClass::Error);
            assert!(last.text.contains("Connection lost"));
        }

        // The synthetic disconnect event does not render a second loss line.
        conn.dispatch_pending();
        let state = client.state();
        let hits = state
            .pane
            .lines()
            .iter()
            .filter(|line| line.text.contains("Connection lost"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_status_report_updates_state() {
        let (client, conn, endpoint) = started_client("test");
        endpoint
            .send(
                EV_TERMINAL_STATUS,
                &StatusReport {
                    docker: "up".to_string(),
                    error: None,
                    container: "present".to_string(),
                    container_running: Some(true),
                    image: Some("ubuntu:22.04".to_string()),
                },
            )
            .unwrap();
        conn.dispatch_pending();

        let state = client.state();
        let status = state.status.as_ref().unwrap();
        assert_eq!(status.docker, "up");
        assert_eq!(status.container_running, Some(true));
    }

    #[test]
    fn test_input_line_editing() {
        let mut input = InputLine::new();
        input.insert_str("hello");
        input.left();
        input.left();
        input.insert('X');
        assert_eq!(input.as_str(), "helXlo");

        input.backspace();
        assert_eq!(input.as_str(), "hello");

        input.home();
        input.delete();
        assert_eq!(input.as_str(), "ello");

        input.end();
        assert_eq!(input.cursor(), 4);
        assert_eq!(input.take(), "ello");
        assert!(input.is_empty());
    }
}

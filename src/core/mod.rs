//! Core session client components.
//!
//! - **ansi**: SGR escape sequence stripping
//! - **pane**: append-only output pane and content classification
//! - **client**: the terminal session client tying input, history and the
//!   channel together
//!
//! # Architecture
//!
//! ```text
//! SessionClient
//! ├── Connection (injected channel handle, subscription tokens)
//! └── SessionState
//!     ├── OutputPane (classified fragments)
//!     ├── InputLine (single-line editor)
//!     └── CommandHistory (bounded recall ring)
//! ```

pub mod ansi;
pub mod client;
pub mod pane;

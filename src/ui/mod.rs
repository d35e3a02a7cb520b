//! User interface rendering.
//!
//! - **renderer**: crossterm raw-mode renderer for the output pane, status
//!   bar and prompt/input line

pub mod renderer;

pub use renderer::Renderer;

//! Command layer for a tmux-style terminal multiplexer.
//!
//! Covers the interactive chooser, the paste buffer stack, choosers that
//! run a command template on selection, and paste injection into panes
//! (bracketed paste, separator rewriting, synchronize-panes fan-out).

pub mod choose;
pub mod choose_command;
pub mod cmd;
pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod inject;
pub mod options;
pub mod paste;
pub mod server;
pub mod target;
pub mod types;

pub use choose::{Choice, ChooseCallback, ChooseItem, ChooseSession};
pub use choose_command::{choose_buffer, choose_window, ChooseCommand};
pub use cmd::{CmdCtx, CmdList, CommandHost};
pub use error::{CmdError, Result};
pub use inject::{paste_filter, paste_pane, paste_window, PasteSeparator};
pub use paste::{PasteBuffer, PasteStore};
pub use server::Server;
pub use types::{Client, Pane, PaneMode, Session, Window};

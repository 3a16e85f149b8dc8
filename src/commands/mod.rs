//! Bot command parsing and response formatting.
//!
//! This module turns Matrix messages into structured [`Command`]s and formats
//! the Markdown the bot sends back: command replies and the panels of the
//! word-chain game and of the polls.
//!
//! # Architecture
//!
//! ```text
//! Matrix Message
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Commander  │  ← Entry point: parse()
//! └─────────────┘
//!      │
//!      ├── Err(NotForBot) ──────────► plain message, offered to the games
//!      ├── Err(InvalidCommand(msg)) ► reply with msg
//!      └── Ok(Command)
//!             │
//!             ├── Start / Help / PollCreate ─► handled by the bot
//!             └── control_action() ──────────► press on a panel
//! ```
//!
//! # Command Structure
//!
//! | Command | Arguments | Description |
//! |---------|-----------|-------------|
//! | `!wordchain` / `!wordchain start` | None | Open the enrollment of a game |
//! | `!wordchain join` / `leave` / `begin` | None | Enrollment controls |
//! | `!wordchain restart` / `end` | None | Post-game controls |
//! | `!wordchain help` | None | Display help information |
//! | `!poll <title>` | One option per following line | Create a poll |
//! | `!poll open` / `close` | None | Start or stop the voting |
//! | `!poll vote <n>` | Option number, from 1 | Vote |
//!
//! Panels list their controls with the command to type, as Matrix has no
//! buttons a bot can listen to.
//!
//! # Error Handling
//!
//! - **Silent Errors** ([`CommandParseError::NotForBot`]): messages that aren't
//!   commands or are for a different bot. These should not generate responses.
//! - **User Errors** ([`CommandParseError::InvalidCommand`]): invalid command
//!   syntax or arguments, with the message to display.

mod command;
mod commander;
mod markdown_response;

pub use crate::commands::command::Command;
pub use crate::commands::commander::Commander;
pub use crate::commands::markdown_response::{format_help, format_panel};

/// Errors that can occur during command parsing.
#[derive(Debug)]
pub enum CommandParseError {
    /// Message is not for this bot (silent error)
    NotForBot,
    /// Invalid command syntax with error message
    InvalidCommand(String),
}

//! Command orchestration.
//!
//! This module provides the [`Commander`] struct, the entry point turning the
//! text of a Matrix message into a [`Command`]. Messages that are not commands
//! for this bot are reported as [`CommandParseError::NotForBot`] so the caller
//! can hand them to the running games as plain messages.
//!
//! # Flow
//!
//! ```text
//! Matrix Message → parse() → Command ─┬─ Start / PollCreate / Help → handled by the bot
//!                                     └─ control_action() → Interaction → panel
//! ```

use command_parser::Parser;

use crate::commands::{
    CommandParseError,
    command::{Command, format_command_error},
};

/// Parses the commands of the bot.
///
/// # Command Prefixes
///
/// Game commands start with `!wordchain`, poll commands with `!poll`. Other
/// messages are silently ignored (returning [`CommandParseError::NotForBot`]).
pub struct Commander {
    /// Command parser for processing user commands
    parser: Parser,
}

impl Default for Commander {
    fn default() -> Self {
        Self::new()
    }
}

impl Commander {
    /// Creates a new Commander with `!` as the command prefix and `-` as the
    /// option prefix.
    pub fn new() -> Self {
        let parser = Parser::new('!', '-');
        Commander { parser }
    }

    /// Parses a Matrix message body into a structured command.
    ///
    /// # Returns
    ///
    /// * `Ok(Command)` - Successfully parsed and validated command
    /// * `Err(CommandParseError::NotForBot)` - Message is not a command or for a different bot
    /// * `Err(CommandParseError::InvalidCommand)` - Command syntax is invalid, with the reply to send
    ///
    /// # Examples
    ///
    /// ```
    /// # use wordchain::commands::Commander;
    /// let commander = Commander::new();
    ///
    /// assert!(commander.parse("!wordchain join").is_ok());
    /// assert!(commander.parse("apple").is_err());
    /// ```
    pub fn parse(&self, body: &str) -> Result<Command, CommandParseError> {
        Command::parse(&self.parser, body).map_err(|error| {
            // Return silently if the command is not for the bot
            // Otherwise, send an error message
            match format_command_error(error) {
                Some(message) => CommandParseError::InvalidCommand(message),
                None => CommandParseError::NotForBot,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commander_parse_valid_command() {
        let commander = Commander::new();
        assert_eq!(commander.parse("!wordchain begin").unwrap(), Command::Begin);
        assert_eq!(commander.parse("!poll vote 1").unwrap(), Command::PollVote(0));
    }

    #[test]
    fn test_commander_parse_not_for_bot() {
        let commander = Commander::new();
        assert!(matches!(
            commander.parse("Hello, world!"),
            Err(CommandParseError::NotForBot)
        ));
        assert!(matches!(
            commander.parse("!other_bot help"),
            Err(CommandParseError::NotForBot)
        ));
    }

    #[test]
    fn test_commander_parse_invalid_command() {
        let commander = Commander::new();
        match commander.parse("!wordchain fly") {
            Err(CommandParseError::InvalidCommand(message)) => {
                assert!(message.contains("Unknown command"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            commander.parse("!poll vote"),
            Err(CommandParseError::InvalidCommand(_))
        ));
    }
}

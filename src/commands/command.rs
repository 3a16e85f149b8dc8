//! Command parsing.
//!
//! This module converts the text of a Matrix message into a structured
//! [`Command`]. Only the first line is parsed as a command; the following
//! lines carry the options of a new poll.

use std::fmt;

use command_parser::{Command as ParserCommand, Parser};
use log::debug;

use crate::commands::markdown_response::{
    format_invalid_poll, format_invalid_vote, format_unknown_command,
};
use crate::transport::ControlAction;

/// Name of the word-chain command (`!wordchain`).
pub const WORDCHAIN_COMMAND: &str = "wordchain";
/// Name of the poll command (`!poll`).
pub const POLL_COMMAND: &str = "poll";

/// Represents a parsed bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open the enrollment of a new game in this room
    Start,
    Join,
    Leave,
    /// Close the enrollment and start the game
    Begin,
    Restart,
    End,
    /// Display help information
    Help,
    /// Create a poll in this room
    PollCreate { title: String, options: Vec<String> },
    PollOpen,
    /// Vote for the option at this zero-based index
    PollVote(usize),
    PollClose,
}

/// Errors that can occur during command parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandParsingError {
    /// The message could not be parsed as a command
    UnableToParse,
    /// The command is for another bot
    NotForBot,
    /// The sub-command is not recognized
    Unknown,
    /// A poll was asked without a title or without options
    InvalidPoll,
    /// The vote command has no valid option number
    InvalidVote,
}

impl Command {
    /// Parses a message body into a Command.
    ///
    /// # Errors
    ///
    /// - The message is not a command - [`CommandParsingError::UnableToParse`]
    /// - The command is for a different bot - [`CommandParsingError::NotForBot`]
    /// - The sub-command is not recognized - [`CommandParsingError::Unknown`]
    /// - The poll command has no title or no options - [`CommandParsingError::InvalidPoll`]
    /// - The vote command has no valid option - [`CommandParsingError::InvalidVote`]
    pub fn parse(parser: &Parser, body: &str) -> Result<Self, CommandParsingError> {
        let mut lines = body.lines();
        let first_line = lines.next().unwrap_or_default();

        // For an unknown reason the parser ignores the last word, so we add a dummy word at the end
        let first_line_with_dummy = first_line.to_string() + " dummy";

        // This is normal to fails if the message is not a command
        let command = match parser.parse(&first_line_with_dummy) {
            Ok(cmd) => cmd,
            Err(_) => return Err(CommandParsingError::UnableToParse),
        };

        debug!("Parsing command: {:?}", command);

        match command.name.as_str() {
            WORDCHAIN_COMMAND => Self::parse_wordchain(&command),
            POLL_COMMAND => Self::parse_poll(&command, first_line, lines),
            _ => Err(CommandParsingError::NotForBot),
        }
    }

    fn parse_wordchain(command: &ParserCommand) -> Result<Self, CommandParsingError> {
        // `!wordchain` alone starts a game
        let Some(subcommand) = command.arguments.first() else {
            return Ok(Command::Start);
        };

        match subcommand.as_str() {
            "start" => Ok(Command::Start),
            "join" => Ok(Command::Join),
            "leave" => Ok(Command::Leave),
            "begin" => Ok(Command::Begin),
            "restart" => Ok(Command::Restart),
            "end" => Ok(Command::End),
            "help" => Ok(Command::Help),
            _ => Err(CommandParsingError::Unknown),
        }
    }

    fn parse_poll<'a>(
        command: &ParserCommand,
        first_line: &str,
        option_lines: impl Iterator<Item = &'a str>,
    ) -> Result<Self, CommandParsingError> {
        let options: Vec<String> = option_lines
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty())
            .collect();

        // With option lines, the rest of the first line is the title
        if !options.is_empty() {
            let title = first_line
                .trim_start()
                .strip_prefix('!')
                .and_then(|line| line.strip_prefix(POLL_COMMAND))
                .unwrap_or_default()
                .trim();
            if title.is_empty() {
                return Err(CommandParsingError::InvalidPoll);
            }

            debug!("Parsed poll \"{}\" with {} options", title, options.len());
            return Ok(Command::PollCreate {
                title: title.to_owned(),
                options,
            });
        }

        match command.arguments.first().map(String::as_str) {
            Some("open") => Ok(Command::PollOpen),
            Some("close") => Ok(Command::PollClose),
            Some("vote") => {
                // 2 arguments: vote and the option number, starting at 1
                let option = command
                    .arguments
                    .get(1)
                    .and_then(|number| number.parse::<usize>().ok())
                    .filter(|number| *number > 0)
                    .ok_or(CommandParsingError::InvalidVote)?;
                Ok(Command::PollVote(option - 1))
            }
            _ => Err(CommandParsingError::InvalidPoll),
        }
    }

    /// The control this command presses, if it is one.
    pub fn control_action(&self) -> Option<ControlAction> {
        match self {
            Command::Join => Some(ControlAction::Join),
            Command::Leave => Some(ControlAction::Leave),
            Command::Begin => Some(ControlAction::Begin),
            Command::Restart => Some(ControlAction::Restart),
            Command::End => Some(ControlAction::End),
            Command::PollOpen => Some(ControlAction::PollOpen),
            Command::PollVote(option) => Some(ControlAction::PollVote(*option)),
            Command::PollClose => Some(ControlAction::PollClose),
            Command::Start | Command::Help | Command::PollCreate { .. } => None,
        }
    }
}

impl From<ControlAction> for Command {
    fn from(action: ControlAction) -> Self {
        match action {
            ControlAction::Join => Command::Join,
            ControlAction::Leave => Command::Leave,
            ControlAction::Begin => Command::Begin,
            ControlAction::Restart => Command::Restart,
            ControlAction::End => Command::End,
            ControlAction::PollOpen => Command::PollOpen,
            ControlAction::PollVote(option) => Command::PollVote(option),
            ControlAction::PollClose => Command::PollClose,
        }
    }
}

/// Text to type to run the command.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "!{} start", WORDCHAIN_COMMAND),
            Command::Join => write!(f, "!{} join", WORDCHAIN_COMMAND),
            Command::Leave => write!(f, "!{} leave", WORDCHAIN_COMMAND),
            Command::Begin => write!(f, "!{} begin", WORDCHAIN_COMMAND),
            Command::Restart => write!(f, "!{} restart", WORDCHAIN_COMMAND),
            Command::End => write!(f, "!{} end", WORDCHAIN_COMMAND),
            Command::Help => write!(f, "!{} help", WORDCHAIN_COMMAND),
            Command::PollCreate { title, options } => {
                write!(f, "!{} {}", POLL_COMMAND, title)?;
                for option in options {
                    write!(f, "\n{}", option)?;
                }
                Ok(())
            }
            Command::PollOpen => write!(f, "!{} open", POLL_COMMAND),
            Command::PollVote(option) => write!(f, "!{} vote {}", POLL_COMMAND, option + 1),
            Command::PollClose => write!(f, "!{} close", POLL_COMMAND),
        }
    }
}

/// Formats a command error into a user-friendly message.
///
/// Returns `None` for messages that are not commands for this bot, which must
/// not be answered.
pub fn format_command_error(error: CommandParsingError) -> Option<String> {
    match error {
        CommandParsingError::Unknown => Some(format_unknown_command()),
        CommandParsingError::InvalidPoll => Some(format_invalid_poll()),
        CommandParsingError::InvalidVote => Some(format_invalid_vote()),
        CommandParsingError::UnableToParse | CommandParsingError::NotForBot => None,
    }
}

//! Markdown response formatters for bot commands.
//!
//! This module formats the replies to commands and renders the panels of the
//! game and of the polls as Markdown for display in Matrix rooms.

use crate::commands::command::Command;
use crate::transport::Panel;

/// Formats the help message showing available bot commands.
///
/// # Examples
///
/// ```
/// # use wordchain::commands::markdown_response::format_help;
/// let help = format_help();
/// assert!(help.contains("Commands:"));
/// ```
pub fn format_help() -> String {
    let body = "Commands:\n\
        - `!wordchain`: open the enrollment of a new word-chain game in this room\n\
        - `!wordchain join` / `!wordchain leave`: join or leave the open enrollment\n\
        - `!wordchain begin`: close the enrollment and start the game\n\
        - `!wordchain restart` / `!wordchain end`: play again or stop once somebody lost\n\
        - `!poll <title>` followed by one option per line: create a poll\n\
        - `!poll open`, `!poll vote <number>`, `!poll close`: run the poll\n\
        - `!wordchain help`: show this help message\n\n\
        During a game, players take turns sending a word starting with the last letter of the previous one. \
        A word can only be used once, and a player who is too slow or sends an invalid word loses.";

    body.to_owned()
}

/// Formats a response for an unknown command.
pub fn format_unknown_command() -> String {
    "Unknown command. Type `!wordchain help` for more information.".to_owned()
}

/// Formats an error response for invalid poll creation syntax.
pub fn format_invalid_poll() -> String {
    "Invalid poll command. Usage: `!poll <title>` followed by one option per line, or `!poll open|close`"
        .to_owned()
}

/// Formats an error response for invalid vote syntax.
pub fn format_invalid_vote() -> String {
    "Invalid vote command. Usage: `!poll vote <option_number>`".to_owned()
}

/// Renders a panel: its title, its lines, then the command of each control.
///
/// # Examples
///
/// ```
/// # use wordchain::commands::markdown_response::format_panel;
/// # use wordchain::transport::{Control, ControlAction, Panel};
/// let panel = Panel {
///     title: "Word-chain participants".to_string(),
///     lines: vec!["1. Alice".to_string()],
///     controls: vec![Control::new(ControlAction::Join, "Join")],
/// };
/// assert!(format_panel(&panel).contains("`!wordchain join`"));
/// ```
pub fn format_panel(panel: &Panel) -> String {
    let mut sections = vec![format!("**{}**", panel.title)];

    if !panel.lines.is_empty() {
        sections.push(panel.lines.join("\n"));
    }

    if !panel.controls.is_empty() {
        let controls = panel
            .controls
            .iter()
            .map(|control| format!("- `{}`: {}", Command::from(control.action), control.label))
            .collect::<Vec<String>>()
            .join("\n");
        sections.push(controls);
    }

    sections.join("\n\n")
}

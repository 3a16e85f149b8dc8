//! Texts and panels shown by the word-chain game.
//!
//! Everything is plain Markdown, the transport decides how panels and
//! controls are laid out.

use crate::game::engine::MoveRejection;
use crate::transport::{Control, ControlAction, Outgoing, Panel, Player};

const ENROLLMENT_TITLE: &str = "Word-chain participants";
const POST_GAME_TITLE: &str = "The game is over. What next?";

/// Numbered list of players, one per line.
fn numbered(players: &[Player]) -> Vec<String> {
    players
        .iter()
        .enumerate()
        .map(|(index, player)| format!("{}. {}", index + 1, player))
        .collect()
}

/// Enrollment panel listing the current roster.
///
/// A closed panel keeps the roster but no longer offers any control.
pub fn enrollment_panel(roster: &[Player], open: bool) -> Panel {
    let lines = if roster.is_empty() {
        vec!["No participants yet.".to_owned()]
    } else {
        numbered(roster)
    };

    let controls = if open {
        vec![
            Control::new(ControlAction::Join, "Join"),
            Control::new(ControlAction::Leave, "Leave"),
            Control::new(ControlAction::Begin, "Start game"),
        ]
    } else {
        Vec::new()
    };

    Panel {
        title: ENROLLMENT_TITLE.to_owned(),
        lines,
        controls,
    }
}

/// Panel offered once a match is over.
pub fn post_game_panel(open: bool) -> Panel {
    let controls = if open {
        vec![
            Control::new(ControlAction::Restart, "New game"),
            Control::new(ControlAction::End, "End game"),
        ]
    } else {
        Vec::new()
    };

    Panel {
        title: POST_GAME_TITLE.to_owned(),
        lines: Vec::new(),
        controls,
    }
}

/// Announces the turn order of a match and who moves first.
pub fn match_started(order: &[Player], restarted: bool) -> Outgoing {
    let header = if restarted {
        "🎲 A new game begins!"
    } else {
        "🎮 The game begins!"
    };

    let mut body = format!("{}\n\nPlayer order:\n{}", header, numbered(order).join("\n"));
    let mut message = Outgoing::default();
    if let Some(first) = order.first() {
        body.push_str(&format!("\n\n{}, you start!", first));
        message = message.mention(&first.id);
    }
    message.body = body;
    message
}

/// Echoes the chain after an accepted word.
pub fn move_accepted(player: &Player, history: &[String]) -> Outgoing {
    Outgoing::text(format!("✅ {}: {}", player, history.join(" - "))).mention(&player.id)
}

pub fn next_turn(player: &Player) -> Outgoing {
    Outgoing::text(format!("Next turn: {}", player)).mention(&player.id)
}

pub fn lost_by_invalid_move(player: &Player, word: &str, rejection: &MoveRejection) -> Outgoing {
    Outgoing::text(format!(
        "❌ {} loses! \"{}\" was refused: {}.",
        player, word, rejection
    ))
    .mention(&player.id)
}

pub fn lost_by_timeout(player: &Player) -> Outgoing {
    Outgoing::text(format!("⏰ {} loses by running out of time!", player)).mention(&player.id)
}

pub fn enrollment_abandoned() -> Outgoing {
    Outgoing::text("Not enough participants, no game was started.")
}

pub fn session_ended() -> Outgoing {
    Outgoing::text("The word-chain game has ended.")
}

pub fn session_abandoned() -> Outgoing {
    Outgoing::text("Nobody chose what to do after the word-chain game, so it has been closed.")
}

pub const RESTART_NOTICE: &str = "A new game has started!";
pub const END_NOTICE: &str = "The game has ended.";

//! Errors of the word-chain game.

use thiserror::Error;

/// Failures of game operations.
///
/// Every variant but [`GameError::Transport`] is a rejection answered to
/// the requesting user; none of them changes any state.
#[derive(Debug, Error)]
pub enum GameError {
    /// A session already exists for the guild
    #[error("A word-chain game is already running here!")]
    AlreadyActive,
    /// No session exists for the guild
    #[error("There is no word-chain game in progress!")]
    NotFound,
    /// Finalization attempted below the minimum roster size
    #[error("At least {need} participants are needed to start the game (currently {have}).")]
    InsufficientRoster { have: usize, need: usize },
    /// An enrollment is already open in the room
    #[error("Participants are already being gathered here.")]
    EnrollmentInProgress,
    /// A join/leave/begin press with no enrollment to receive it
    #[error("There is no open enrollment here.")]
    NoOpenEnrollment,
    /// The control is not offered by the panel currently shown
    #[error("This action is not available right now.")]
    UnsupportedControl,
    /// The chat transport failed; fatal for the enclosing operation
    #[error("transport failure: {0}")]
    Transport(#[from] anyhow::Error),
}

impl GameError {
    /// Text shown to the user who triggered the error.
    pub fn user_message(&self) -> String {
        match self {
            GameError::Transport(_) => "Something went wrong, please try again later.".to_owned(),
            other => other.to_string(),
        }
    }
}

//! Turn engine of the word-chain game.
//!
//! [`WordChainGame`] owns the authoritative state of one match: the turn
//! order, the pointer to the player expected to move, the words already
//! played and the chain history. It has no I/O; the session turn loop feeds
//! it the words it receives.
//!
//! # Rules
//!
//! - The first word of a match can be any non-empty word.
//! - Every following word must start with the last character of the
//!   previous word and must not have been played in this match.
//! - Words are compared exactly (case-sensitive).

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;

use crate::transport::Player;

/// Strategy used to arrange the players of a match.
pub trait TurnOrder: Send + Sync {
    /// Reorders `players` in place; the first one moves first.
    fn arrange(&self, players: &mut [Player]);
}

/// Uniformly random turn order.
pub struct RandomOrder;

impl TurnOrder for RandomOrder {
    fn arrange(&self, players: &mut [Player]) {
        players.shuffle(&mut rand::rng());
    }
}

/// Why a word was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    /// The word was submitted by someone else than the current player
    WrongTurn,
    /// The word is empty
    EmptyWord,
    /// The word was already played in this match
    AlreadyUsed,
    /// The word does not start with the last character of the previous one
    BrokenChain { expected: char, found: char },
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::WrongTurn => write!(f, "it was not their turn"),
            MoveRejection::EmptyWord => write!(f, "no word was given"),
            MoveRejection::AlreadyUsed => write!(f, "the word was already used"),
            MoveRejection::BrokenChain { expected, found } => {
                write!(f, "the word must start with '{}', not '{}'", expected, found)
            }
        }
    }
}

/// State of one word-chain match.
#[derive(Debug, Clone)]
pub struct WordChainGame {
    /// Enrolled players, in join order
    participants: Vec<Player>,
    /// Turn order of the current match
    player_order: Vec<Player>,
    current_turn_index: usize,
    used_words: HashSet<String>,
    history: Vec<String>,
    last_word: Option<String>,
}

impl WordChainGame {
    /// Creates a game whose turn order is the join order.
    pub fn new(participants: Vec<Player>) -> Self {
        WordChainGame {
            player_order: participants.clone(),
            participants,
            current_turn_index: 0,
            used_words: HashSet::new(),
            history: Vec::new(),
            last_word: None,
        }
    }

    /// Starts a fresh match: new turn order, empty history.
    pub fn arrange(&mut self, order: &dyn TurnOrder) {
        let mut player_order = self.participants.clone();
        order.arrange(&mut player_order);
        self.player_order = player_order;
        self.current_turn_index = 0;
        self.used_words.clear();
        self.history.clear();
        self.last_word = None;
    }

    /// The player expected to move, `None` if the roster is empty.
    pub fn current_player(&self) -> Option<&Player> {
        self.player_order.get(self.current_turn_index)
    }

    /// Passes the turn to the next player.
    pub fn advance(&mut self) {
        if self.player_order.is_empty() {
            return;
        }
        self.current_turn_index = (self.current_turn_index + 1) % self.player_order.len();
    }

    /// Checks whether `actor` may play `word` now.
    pub fn validate(&self, word: &str, actor: &Player) -> Result<(), MoveRejection> {
        if self.current_player() != Some(actor) {
            return Err(MoveRejection::WrongTurn);
        }

        let Some(first) = word.chars().next() else {
            return Err(MoveRejection::EmptyWord);
        };

        // First move of the match
        let Some(last_word) = &self.last_word else {
            return Ok(());
        };

        if let Some(expected) = last_word.chars().last()
            && expected != first
        {
            return Err(MoveRejection::BrokenChain {
                expected,
                found: first,
            });
        }

        if self.used_words.contains(word) {
            return Err(MoveRejection::AlreadyUsed);
        }

        Ok(())
    }

    /// Validates and applies a move, then passes the turn.
    ///
    /// # Arguments
    ///
    /// * `word` - The word, already trimmed
    /// * `actor` - The player who sent it
    ///
    /// # Returns
    ///
    /// The player whose turn it now is.
    ///
    /// # Errors
    ///
    /// Returns the [`MoveRejection`] of an illegal move. A rejected move
    /// leaves the state untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use wordchain::game::engine::{MoveRejection, WordChainGame};
    /// use wordchain::transport::Player;
    ///
    /// let alice = Player::new("@alice:example.com", "Alice");
    /// let bob = Player::new("@bob:example.com", "Bob");
    /// let mut game = WordChainGame::new(vec![alice.clone(), bob.clone()]);
    ///
    /// assert_eq!(game.play("apple", &alice), Ok(&bob));
    /// assert_eq!(
    ///     game.play("banana", &bob),
    ///     Err(MoveRejection::BrokenChain { expected: 'e', found: 'b' })
    /// );
    /// ```
    pub fn play(&mut self, word: &str, actor: &Player) -> Result<&Player, MoveRejection> {
        self.validate(word, actor)?;

        self.history.push(word.to_owned());
        self.used_words.insert(word.to_owned());
        self.last_word = Some(word.to_owned());
        self.advance();

        self.current_player().ok_or(MoveRejection::WrongTurn)
    }

    /// Enrolled players, in join order.
    pub fn participants(&self) -> &[Player] {
        &self.participants
    }

    pub fn player_order(&self) -> &[Player] {
        &self.player_order
    }

    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    /// Words accepted in this match, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn used_words(&self) -> &HashSet<String> {
        &self.used_words
    }

    pub fn last_word(&self) -> Option<&str> {
        self.last_word.as_deref()
    }
}

/// Turn order keeping the join order.
#[cfg(test)]
pub struct JoinOrder;

#[cfg(test)]
impl TurnOrder for JoinOrder {
    fn arrange(&self, _players: &mut [Player]) {}
}

/// Turn order reversing the join order.
#[cfg(test)]
pub struct ReversedOrder;

#[cfg(test)]
impl TurnOrder for ReversedOrder {
    fn arrange(&self, players: &mut [Player]) {
        players.reverse();
    }
}

//! State of one running word-chain session.

use crate::game::engine::WordChainGame;
use crate::transport::{ChannelId, GuildId, Player};

/// Phase of a session once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The turn loop is running
    Active,
    /// A player lost, the post-game panel is shown
    Forfeited,
}

/// A match bound to its guild and to the channel created for it.
#[derive(Debug)]
pub struct GameSession {
    pub guild: GuildId,
    /// Channel where the session was requested, used for announcements
    pub home: ChannelId,
    /// Restricted channel owned by the session
    pub channel: ChannelId,
    pub game: WordChainGame,
    pub phase: SessionPhase,
}

impl GameSession {
    /// Creates the session of a roster whose channel was just provisioned.
    ///
    /// # Arguments
    ///
    /// * `guild` - The guild owning the session
    /// * `home` - Where the game was asked
    /// * `channel` - The restricted channel created for the roster
    /// * `roster` - Enrolled players, in join order
    pub fn new(guild: GuildId, home: ChannelId, channel: ChannelId, roster: Vec<Player>) -> Self {
        GameSession {
            guild,
            home,
            channel,
            game: WordChainGame::new(roster),
            phase: SessionPhase::Active,
        }
    }

    /// Players allowed in the session channel.
    pub fn members(&self) -> &[Player] {
        self.game.participants()
    }
}

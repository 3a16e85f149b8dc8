//! Guild-keyed registry of the running word-chain sessions.
//!
//! The [`SessionManager`] is the only owner of the guild → session map. A
//! guild has at most one session, from [`SessionManager::create_session`] to
//! [`SessionManager::end_session`]. Creating a session reserves the guild
//! before the channel is provisioned, so two concurrent creations for the
//! same guild can never both succeed, and a failed provisioning leaves
//! nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::game::GameSettings;
use crate::game::engine::{MoveRejection, TurnOrder};
use crate::game::error::GameError;
use crate::game::render;
use crate::game::session::{GameSession, SessionPhase};
use crate::transport::{ChannelId, GuildId, MessageHub, Player, Transport, WaitOutcome};

/// Shared handle on a live session.
pub type SessionHandle = Arc<Mutex<GameSession>>;

/// Entry of a guild in the session map.
enum Slot {
    /// The channel of the session is being created
    Provisioning,
    /// The session exists and its channel is usable
    Live(SessionHandle),
}

/// Why a match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForfeitReason {
    /// The current player sent a word the engine refused
    InvalidMove {
        word: String,
        rejection: MoveRejection,
    },
    /// The current player sent nothing before the turn timeout
    TimedOut,
}

/// Terminal outcome of a turn loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forfeit {
    pub loser: Player,
    pub reason: ForfeitReason,
}

/// Owner of the word-chain sessions, at most one per guild.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use wordchain::game::GameSettings;
/// use wordchain::game::engine::RandomOrder;
/// use wordchain::game::manager::SessionManager;
/// use wordchain::transport::{ChannelId, GuildId, MessageHub, Player, Transport};
///
/// # async fn example(transport: Arc<dyn Transport>) -> Result<(), anyhow::Error> {
/// let manager = SessionManager::new(
///     transport,
///     Arc::new(MessageHub::new()),
///     Arc::new(RandomOrder),
///     GameSettings::default(),
/// );
///
/// let home = ChannelId::from("!home:example.com");
/// let roster = vec![
///     Player::new("@alice:example.com", "Alice"),
///     Player::new("@bob:example.com", "Bob"),
/// ];
/// let session = manager
///     .create_session(&GuildId::from("!home:example.com"), &home, roster)
///     .await?;
/// let forfeit = manager.run_turn_loop(&session).await?;
/// println!("{} lost", forfeit.loser);
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    hub: Arc<MessageHub>,
    order: Arc<dyn TurnOrder>,
    settings: GameSettings,
    sessions: Mutex<HashMap<GuildId, Slot>>,
}

impl SessionManager {
    /// Creates a manager without sessions.
    ///
    /// # Arguments
    ///
    /// * `transport` - Used to provision, announce in and delete the channels
    /// * `hub` - Where the turn loops wait for the words of the players
    /// * `order` - Arranges the players at the start of every match
    /// * `settings` - Turn timeout and channel name
    pub fn new(
        transport: Arc<dyn Transport>,
        hub: Arc<MessageHub>,
        order: Arc<dyn TurnOrder>,
        settings: GameSettings,
    ) -> Self {
        SessionManager {
            transport,
            hub,
            order,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a session exists (or is being created) for `guild`.
    pub async fn contains(&self, guild: &GuildId) -> bool {
        self.sessions.lock().await.contains_key(guild)
    }

    /// The live session of `guild`, if any.
    pub async fn get(&self, guild: &GuildId) -> Option<SessionHandle> {
        match self.sessions.lock().await.get(guild) {
            Some(Slot::Live(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Whether `channel` is the channel of a live session.
    ///
    /// A game cannot be asked from inside another game's channel.
    pub async fn owns_channel(&self, channel: &ChannelId) -> bool {
        let sessions = self.sessions.lock().await;
        for slot in sessions.values() {
            if let Slot::Live(session) = slot
                && &session.lock().await.channel == channel
            {
                return true;
            }
        }
        false
    }

    /// Creates the session of `guild` for `roster`.
    ///
    /// Provisions a channel restricted to the roster, shuffles the turn order
    /// and announces it in the new channel.
    ///
    /// # Errors
    ///
    /// - [`GameError::AlreadyActive`] if `guild` already has a session
    /// - [`GameError::Transport`] if the channel cannot be created; no entry
    ///   is left for `guild` in that case
    pub async fn create_session(
        &self,
        guild: &GuildId,
        home: &ChannelId,
        roster: Vec<Player>,
    ) -> Result<SessionHandle, GameError> {
        {
            let mut sessions = self.sessions.lock().await;
            if sessions.contains_key(guild) {
                return Err(GameError::AlreadyActive);
            }
            sessions.insert(guild.clone(), Slot::Provisioning);
        }

        let channel = match self
            .transport
            .create_restricted_channel(guild, &self.settings.channel_name, &roster)
            .await
        {
            Ok(channel) => channel,
            Err(e) => {
                self.sessions.lock().await.remove(guild);
                error!("failed to create the channel of {}: {:?}", guild, e);
                return Err(GameError::Transport(e));
            }
        };

        let mut session = GameSession::new(guild.clone(), home.clone(), channel.clone(), roster);
        session.game.arrange(self.order.as_ref());
        let announcement = render::match_started(session.game.player_order(), false);

        let session = Arc::new(Mutex::new(session));
        self.sessions
            .lock()
            .await
            .insert(guild.clone(), Slot::Live(Arc::clone(&session)));
        info!("session created for {} in {}", guild, channel);

        if let Err(e) = self.transport.send_message(&channel, announcement).await {
            error!("failed to announce the session of {}: {:?}", guild, e);
            self.teardown(&session).await;
            return Err(GameError::Transport(e));
        }

        Ok(session)
    }

    /// Starts a new match in the session of `guild` with a fresh order.
    ///
    /// The roster and the channel are kept; the history, the used words and
    /// the turn pointer are reset.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the session no longer exists
    /// - [`GameError::Transport`] if the new match cannot be announced; the
    ///   session is left to the caller
    pub async fn restart(&self, guild: &GuildId) -> Result<(), GameError> {
        let session = self.get(guild).await.ok_or(GameError::NotFound)?;

        let (channel, announcement) = {
            let mut session = session.lock().await;
            session.game.arrange(self.order.as_ref());
            session.phase = SessionPhase::Active;
            (
                session.channel.clone(),
                render::match_started(session.game.player_order(), true),
            )
        };
        info!("session of {} restarted", guild);

        self.transport.send_message(&channel, announcement).await?;
        Ok(())
    }

    /// Destroys the session of `guild` and deletes its channel.
    ///
    /// This is the only way a session goes away. The entry is removed before
    /// the channel is deleted.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if `guild` has no live session
    /// - [`GameError::Transport`] if the channel cannot be deleted; the
    ///   session stays destroyed
    pub async fn end_session(&self, guild: &GuildId) -> Result<(), GameError> {
        self.end(guild, None).await
    }

    /// Ends `session` if it is still the live session of its guild, logging
    /// any failure.
    ///
    /// A newer session of the same guild is left alone.
    pub async fn teardown(&self, session: &SessionHandle) {
        let guild = session.lock().await.guild.clone();
        match self.end(&guild, Some(session)).await {
            Ok(()) | Err(GameError::NotFound) => {}
            Err(e) => warn!("failed to close the session of {}: {}", guild, e),
        }
    }

    /// Removes the live session of `guild`, if it is `expected` when given,
    /// then deletes its channel.
    async fn end(
        &self,
        guild: &GuildId,
        expected: Option<&SessionHandle>,
    ) -> Result<(), GameError> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            // A provisioning slot belongs to its creator
            let owned = match sessions.get(guild) {
                Some(Slot::Live(live)) => {
                    expected.is_none_or(|expected| Arc::ptr_eq(expected, live))
                }
                _ => false,
            };
            if !owned {
                return Err(GameError::NotFound);
            }
            match sessions.remove(guild) {
                Some(Slot::Live(session)) => session,
                _ => return Err(GameError::NotFound),
            }
        };

        let (channel, members) = {
            let session = session.lock().await;
            (session.channel.clone(), session.members().to_vec())
        };
        info!("session of {} ended", guild);

        if let Err(e) = self.transport.delete_channel(&channel, &members).await {
            error!("failed to delete {} of {}: {:?}", channel, guild, e);
            return Err(GameError::Transport(e));
        }

        Ok(())
    }

    /// Plays turns until a player forfeits.
    ///
    /// Each turn waits for the next message of the current player in the
    /// session channel, bounded by the turn timeout. Messages of anybody else
    /// are never seen by the loop. The forfeit is announced in the session
    /// channel before returning.
    ///
    /// The first turn starts as soon as the match is announced: on protocols
    /// where the players must first accept an invitation to the channel, its
    /// timeout also covers that.
    ///
    /// # Returns
    ///
    /// The player who lost and why.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Transport`] if a message of the loop cannot be
    /// sent. The session is left to the caller.
    pub async fn run_turn_loop(&self, session: &SessionHandle) -> Result<Forfeit, GameError> {
        loop {
            let (guild, channel, current) = {
                let session = session.lock().await;
                let current = session
                    .game
                    .current_player()
                    .cloned()
                    .ok_or(GameError::InsufficientRoster {
                        have: 0,
                        need: self.settings.min_players,
                    })?;
                (session.guild.clone(), session.channel.clone(), current)
            };

            let message = match self
                .hub
                .wait_for(&channel, &current.id, self.settings.turn_timeout)
                .await
            {
                WaitOutcome::Message(message) => message,
                WaitOutcome::TimedOut => {
                    session.lock().await.phase = SessionPhase::Forfeited;
                    info!("{} timed out in the session of {}", current.id, guild);
                    self.transport
                        .send_message(&channel, render::lost_by_timeout(&current))
                        .await?;

                    return Ok(Forfeit {
                        loser: current,
                        reason: ForfeitReason::TimedOut,
                    });
                }
            };

            let word = message.body.trim();
            let played = {
                let mut session = session.lock().await;
                match session.game.play(word, &message.author) {
                    Ok(next) => Ok((next.clone(), session.game.history().to_vec())),
                    Err(rejection) => {
                        session.phase = SessionPhase::Forfeited;
                        Err(rejection)
                    }
                }
            };

            match played {
                Ok((next, history)) => {
                    debug!("{} played \"{}\" in the session of {}", current.id, word, guild);
                    self.transport
                        .send_message(&channel, render::move_accepted(&current, &history))
                        .await?;
                    self.transport
                        .send_message(&channel, render::next_turn(&next))
                        .await?;
                }
                Err(rejection) => {
                    info!(
                        "{} lost the session of {}: {}",
                        current.id, guild, rejection
                    );
                    self.transport
                        .send_message(
                            &channel,
                            render::lost_by_invalid_move(&current, word, &rejection),
                        )
                        .await?;

                    return Ok(Forfeit {
                        loser: current,
                        reason: ForfeitReason::InvalidMove {
                            word: word.to_owned(),
                            rejection,
                        },
                    });
                }
            }
        }
    }
}

//! Turn-based word-chain game.
//!
//! A match goes through these phases:
//!
//! ```text
//! !wordchain ──► Enrolling ──► Active ──► Forfeited ──► Destroyed
//!                    │            ▲           │
//!                    │            └─restart───┘
//!                    └─timeout──► (no session)
//! ```
//!
//! - [`enrollment`] gathers the roster in the room where the game was asked
//! - [`manager`] owns the guild → session map, provisions the private channel
//!   and runs the turn loop on top of the [`engine`]
//! - [`post_game`] offers to play again or to stop once somebody lost
//!
//! [`WordChain`] ties the phases together and routes the control presses
//! and the plain messages received by the bot.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::config::GameConfig;
use crate::transport::{
    ChannelId, ControlAction, ControlBoard, GuildId, IncomingMessage, Interaction, MessageHub,
    NoticeTarget, Player, Transport,
};

pub mod engine;
pub mod enrollment;
pub mod error;
pub mod manager;
pub mod post_game;
pub mod render;
pub mod session;

use crate::game::engine::TurnOrder;
use crate::game::enrollment::{EnrollmentOutcome, reject, run_enrollment};
use crate::game::error::GameError;
use crate::game::manager::{SessionHandle, SessionManager};
use crate::game::post_game::{PostGameDecision, run_post_game};

/// Tunables of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    /// Idle time after which an enrollment is abandoned
    pub enrollment_timeout: Duration,
    /// Time given to a player to answer
    pub turn_timeout: Duration,
    /// Idle time after which the post-game panel closes the session
    pub post_game_timeout: Duration,
    /// Smallest roster `begin` accepts
    pub min_players: usize,
    /// Name of the channels created for the sessions
    pub channel_name: String,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            enrollment_timeout: Duration::from_secs(180),
            turn_timeout: Duration::from_secs(30),
            post_game_timeout: Duration::from_secs(180),
            min_players: 2,
            channel_name: "word-chain".to_owned(),
        }
    }
}

impl From<&GameConfig> for GameSettings {
    fn from(config: &GameConfig) -> Self {
        GameSettings {
            enrollment_timeout: Duration::from_secs(config.enrollment_timeout),
            turn_timeout: Duration::from_secs(config.turn_timeout),
            post_game_timeout: Duration::from_secs(config.post_game_timeout),
            min_players: config.min_players,
            channel_name: config.channel_name.clone(),
        }
    }
}

/// Entry point of the word-chain game.
///
/// One instance serves every guild. Each [`WordChain::start`] call drives a
/// whole game in the task of the request, while the presses and the plain
/// messages of the players reach it through [`WordChain::on_interaction`]
/// and [`WordChain::on_message`] from other tasks.
pub struct WordChain {
    transport: Arc<dyn Transport>,
    board: Arc<ControlBoard>,
    hub: Arc<MessageHub>,
    manager: SessionManager,
    settings: GameSettings,
}

impl WordChain {
    /// Creates the game controller.
    ///
    /// # Arguments
    ///
    /// * `transport` - Chat transport for every message, panel and channel
    /// * `board` - Control dispatch table, shared with the polls
    /// * `order` - Arranges the players at the start of every match
    /// * `settings` - Timeouts, roster minimum and channel name
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use wordchain::game::{GameSettings, WordChain, engine::RandomOrder};
    /// use wordchain::transport::{ControlBoard, Transport};
    ///
    /// # fn example(transport: Arc<dyn Transport>) {
    /// let word_chain = WordChain::new(
    ///     transport,
    ///     Arc::new(ControlBoard::new()),
    ///     Arc::new(RandomOrder),
    ///     GameSettings::default(),
    /// );
    /// # }
    /// ```
    pub fn new(
        transport: Arc<dyn Transport>,
        board: Arc<ControlBoard>,
        order: Arc<dyn TurnOrder>,
        settings: GameSettings,
    ) -> Self {
        let hub = Arc::new(MessageHub::new());
        let manager = SessionManager::new(
            Arc::clone(&transport),
            Arc::clone(&hub),
            order,
            settings.clone(),
        );

        WordChain {
            transport,
            board,
            hub,
            manager,
            settings,
        }
    }

    /// The sessions of every guild.
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Runs a whole game requested by `initiator` in `home`.
    ///
    /// Returns once the session is destroyed or the enrollment is abandoned.
    ///
    /// # Arguments
    ///
    /// * `guild` - The guild the session belongs to
    /// * `home` - Where the enrollment is shown and the session announced
    /// * `initiator` - The user who asked for the game
    ///
    /// # Errors
    ///
    /// - [`GameError::AlreadyActive`] if `guild` has a session, or if `home`
    ///   is the channel of a running session
    /// - [`GameError::EnrollmentInProgress`] if an enrollment is open in `home`
    /// - [`GameError::Transport`] if the chat fails; the session, if one was
    ///   created, is ended and its channel deleted before returning
    ///
    /// Rejections are returned before any panel is shown so the caller can
    /// answer the request with [`WordChain::report`].
    pub async fn start(
        &self,
        guild: &GuildId,
        home: &ChannelId,
        initiator: &Player,
    ) -> Result<(), GameError> {
        if self.manager.contains(guild).await || self.manager.owns_channel(home).await {
            return Err(GameError::AlreadyActive);
        }

        let roster = match run_enrollment(
            self.transport.as_ref(),
            &self.board,
            home,
            initiator,
            &self.settings,
        )
        .await?
        {
            EnrollmentOutcome::Ready(roster) => roster,
            EnrollmentOutcome::Abandoned(roster) => {
                info!(
                    "no game in {}: enrollment abandoned with {} participant(s)",
                    guild,
                    roster.len()
                );
                self.transport
                    .send_message(home, render::enrollment_abandoned())
                    .await?;
                return Ok(());
            }
        };

        let session = self.manager.create_session(guild, home, roster).await?;

        // No error may leave the session behind
        if let Err(e) = self.play(guild, &session).await {
            error!("session of {} aborted: {}", guild, e);
            self.manager.teardown(&session).await;
            return Err(e);
        }

        Ok(())
    }

    /// Alternates matches and post-game choices until the session is closed.
    async fn play(&self, guild: &GuildId, session: &SessionHandle) -> Result<(), GameError> {
        loop {
            let forfeit = self.manager.run_turn_loop(session).await?;
            info!("{} lost in {} ({:?})", forfeit.loser.id, guild, forfeit.reason);

            let decision = run_post_game(
                self.transport.as_ref(),
                &self.board,
                &self.manager,
                session,
                &self.settings,
            )
            .await?;

            match decision {
                PostGameDecision::Restart => continue,
                PostGameDecision::Ended | PostGameDecision::Abandoned => return Ok(()),
            }
        }
    }

    /// Routes a press on a word-chain control to the panel owning it.
    ///
    /// Presses without an owner are answered to their presser.
    pub async fn on_interaction(&self, interaction: Interaction) {
        let Err(interaction) = self.board.dispatch(interaction).await else {
            return;
        };

        let error = match interaction.action {
            ControlAction::Join | ControlAction::Leave | ControlAction::Begin => {
                GameError::NoOpenEnrollment
            }
            ControlAction::Restart | ControlAction::End => GameError::NotFound,
            _ => GameError::UnsupportedControl,
        };
        reject(self.transport.as_ref(), &interaction, &error).await;
    }

    /// Offers a plain message to the running turn loops.
    ///
    /// # Returns
    ///
    /// `true` if the message was the awaited move of a turn.
    pub fn on_message(&self, message: IncomingMessage) -> bool {
        self.hub.deliver(message)
    }

    /// Answers a failed [`WordChain::start`] in `home`.
    pub async fn report(
        &self,
        home: &ChannelId,
        initiator: &Player,
        event_id: &str,
        error: GameError,
    ) {
        if let GameError::Transport(e) = &error {
            error!("word-chain game in {} failed: {:?}", home, e);
        }

        let target = NoticeTarget {
            channel: home.clone(),
            user: initiator.id.clone(),
            event_id: Some(event_id.to_owned()),
        };
        if let Err(e) = self
            .transport
            .send_ephemeral(&target, &error.user_message())
            .await
        {
            error!("failed to answer {}: {:?}", initiator.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::JoinOrder;
    use crate::transport::PanelFamily;
    use crate::transport::testing::RecordingTransport;

    fn alice() -> Player {
        Player::new("@alice:example.com", "Alice")
    }

    fn bob() -> Player {
        Player::new("@bob:example.com", "Bob")
    }

    fn home() -> ChannelId {
        ChannelId::from("!home:example.com")
    }

    fn guild() -> GuildId {
        GuildId::from("!home:example.com")
    }

    fn press(channel: &ChannelId, user: Player, action: ControlAction) -> Interaction {
        Interaction {
            channel: channel.clone(),
            user,
            action,
            event_id: "$press".to_string(),
        }
    }

    fn word_chain() -> (Arc<RecordingTransport>, Arc<ControlBoard>, Arc<WordChain>) {
        let transport = Arc::new(RecordingTransport::new());
        let board = Arc::new(ControlBoard::new());
        let game = Arc::new(WordChain::new(
            transport.clone(),
            Arc::clone(&board),
            Arc::new(JoinOrder),
            GameSettings::default(),
        ));
        (transport, board, game)
    }

    async fn until<F: Fn() -> bool>(condition: F) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    /// Fills the roster with Alice and Bob and begins the match.
    async fn enroll(game: &WordChain, board: &ControlBoard) {
        until(|| board.is_registered(&home(), PanelFamily::Enrollment)).await;
        for (user, action) in [
            (alice(), ControlAction::Join),
            (bob(), ControlAction::Join),
            (bob(), ControlAction::Begin),
        ] {
            game.on_interaction(press(&home(), user, action)).await;
        }
    }

    async fn session_channel(game: &WordChain) -> ChannelId {
        loop {
            if let Some(session) = game.manager().get(&guild()).await {
                return session.lock().await.channel.clone();
            }
            tokio::task::yield_now().await;
        }
    }

    fn spawn_start(game: &Arc<WordChain>) -> tokio::task::JoinHandle<Result<(), GameError>> {
        let game = Arc::clone(game);
        tokio::spawn(async move { game.start(&guild(), &home(), &alice()).await })
    }

    #[test]
    fn test_settings_from_config() {
        let config = GameConfig {
            enrollment_timeout: 60,
            turn_timeout: 10,
            post_game_timeout: 90,
            min_players: 3,
            channel_name: "chain".to_string(),
        };

        let settings = GameSettings::from(&config);

        assert_eq!(settings.turn_timeout, Duration::from_secs(10));
        assert_eq!(settings.min_players, 3);
        assert_eq!(settings.channel_name, "chain");
    }

    #[tokio::test]
    async fn test_unowned_presses_are_rejected() {
        let (transport, _board, game) = word_chain();

        game.on_interaction(press(&home(), alice(), ControlAction::Join))
            .await;
        game.on_interaction(press(&home(), alice(), ControlAction::End))
            .await;

        assert_eq!(
            transport.ephemerals(),
            vec![
                GameError::NoOpenEnrollment.user_message(),
                GameError::NotFound.user_message()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_enrollment_is_announced() {
        let (transport, _board, game) = word_chain();

        game.start(&guild(), &home(), &alice()).await.unwrap();

        assert_eq!(
            transport.messages(&home()),
            vec!["Not enough participants, no game was started.".to_string()]
        );
        assert!(!game.manager().contains(&guild()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_game() {
        let (transport, board, game) = word_chain();

        let running = {
            let game = Arc::clone(&game);
            tokio::spawn(async move { game.start(&guild(), &home(), &alice()).await })
        };

        // Enrollment in the home room
        until(|| board.is_registered(&home(), PanelFamily::Enrollment)).await;
        for (user, action) in [
            (alice(), ControlAction::Join),
            (bob(), ControlAction::Join),
            (bob(), ControlAction::Begin),
        ] {
            game.on_interaction(press(&home(), user, action)).await;
        }

        // A second request while the session runs
        while !game.manager().contains(&guild()).await {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            game.start(&guild(), &home(), &bob()).await,
            Err(GameError::AlreadyActive)
        ));

        let channel = game.manager().get(&guild()).await.unwrap().lock().await.channel.clone();

        // Alice plays, Bob stays silent and times out
        until(|| game.hub.is_waiting(&channel, &alice().id)).await;
        assert!(game.on_message(IncomingMessage {
            channel: channel.clone(),
            author: alice(),
            body: "apple".to_string(),
            event_id: "$apple".to_string(),
        }));

        // Post-game: end
        tokio::time::sleep(Duration::from_secs(31)).await;
        until(|| board.is_registered(&channel, PanelFamily::PostGame)).await;
        game.on_interaction(press(&channel, bob(), ControlAction::End))
            .await;

        running.await.unwrap().unwrap();
        assert!(!game.manager().contains(&guild()).await);
        assert_eq!(transport.deleted(), vec![channel.clone()]);
        assert!(
            transport
                .messages(&channel)
                .contains(&"⏰ Bob loses by running out of time!".to_string())
        );

        game.on_interaction(press(&channel, bob(), ControlAction::End))
            .await;
        assert_eq!(
            transport.ephemerals().last().unwrap(),
            &GameError::NotFound.user_message()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resumes_play_in_same_channel() {
        let (transport, board, game) = word_chain();
        let running = spawn_start(&game);
        enroll(&game, &board).await;
        let channel = session_channel(&game).await;

        // Alice stays silent during the first match
        until(|| game.hub.is_waiting(&channel, &alice().id)).await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        until(|| board.is_registered(&channel, PanelFamily::PostGame)).await;
        game.on_interaction(press(&channel, bob(), ControlAction::Restart))
            .await;

        // The second match is played in the same channel
        until(|| game.hub.is_waiting(&channel, &alice().id)).await;
        assert!(game.on_message(IncomingMessage {
            channel: channel.clone(),
            author: alice(),
            body: "apple".to_string(),
            event_id: "$apple".to_string(),
        }));
        until(|| {
            transport
                .messages(&channel)
                .contains(&"✅ Alice: apple".to_string())
        })
        .await;
        assert!(game.manager().contains(&guild()).await);

        tokio::time::sleep(Duration::from_secs(31)).await;
        until(|| board.is_registered(&channel, PanelFamily::PostGame)).await;
        game.on_interaction(press(&channel, alice(), ControlAction::End))
            .await;

        running.await.unwrap().unwrap();
        let messages = transport.messages(&channel);
        assert!(messages.contains(&"⏰ Alice loses by running out of time!".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("🎲 A new game begins!")));
        assert!(messages.contains(&"⏰ Bob loses by running out of time!".to_string()));
        assert_eq!(transport.deleted(), vec![channel]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_inside_session_channel_is_rejected() {
        let (transport, board, game) = word_chain();
        let running = spawn_start(&game);
        enroll(&game, &board).await;
        let channel = session_channel(&game).await;

        // Bob asks for a game from the private room of the running one
        let inner = GuildId::from(channel.as_str());
        assert!(matches!(
            game.start(&inner, &channel, &bob()).await,
            Err(GameError::AlreadyActive)
        ));
        assert!(!board.is_registered(&channel, PanelFamily::Enrollment));

        // Alice times out and nobody answers the post-game panel
        running.await.unwrap().unwrap();

        assert!(!game.manager().contains(&guild()).await);
        assert_eq!(transport.deleted(), vec![channel]);
        assert!(
            transport
                .messages(&home())
                .contains(&render::session_abandoned().body)
        );
        // The home room is free again
        assert!(game.start(&guild(), &home(), &alice()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_game_panel_survives_enrollment_in_session_channel() {
        let (transport, board, game) = word_chain();
        let running = spawn_start(&game);
        enroll(&game, &board).await;
        let channel = session_channel(&game).await;

        // An enrollment panel occupying the session channel
        let _enrollment = board.register(&channel, PanelFamily::Enrollment).unwrap();

        until(|| game.hub.is_waiting(&channel, &alice().id)).await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        until(|| board.is_registered(&channel, PanelFamily::PostGame)).await;
        game.on_interaction(press(&channel, bob(), ControlAction::End))
            .await;

        running.await.unwrap().unwrap();
        assert!(!game.manager().contains(&guild()).await);
        assert_eq!(transport.deleted(), vec![channel]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_during_play_ends_session() {
        let (transport, board, game) = word_chain();
        transport.fail_panels_in("!game");
        let running = spawn_start(&game);
        enroll(&game, &board).await;
        let channel = session_channel(&game).await;

        // Alice times out, then the post-game panel cannot be shown
        let result = running.await.unwrap();

        assert!(matches!(result, Err(GameError::Transport(_))));
        assert!(!game.manager().contains(&guild()).await);
        assert!(!board.is_registered(&channel, PanelFamily::PostGame));
        assert_eq!(transport.deleted(), vec![channel]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_provisioning_is_reported() {
        let (transport, board, game) = word_chain();
        transport.fail_channel_creation();
        let running = spawn_start(&game);
        enroll(&game, &board).await;

        let result = running.await.unwrap();

        assert!(matches!(result, Err(GameError::Transport(_))));
        assert!(!game.manager().contains(&guild()).await);
        assert!(!board.is_registered(&home(), PanelFamily::Enrollment));
        assert!(transport.deleted().is_empty());
    }
}

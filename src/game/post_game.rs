//! Choice offered once a match is over: play again or stop.
//!
//! The panel lives in the session channel under its own
//! [`PanelFamily::PostGame`] slot, so an enrollment can never take its place.

use log::{info, warn};

use crate::game::GameSettings;
use crate::game::enrollment::reject;
use crate::game::error::GameError;
use crate::game::manager::{SessionHandle, SessionManager};
use crate::game::render;
use crate::transport::{ControlAction, ControlBoard, PanelFamily, PanelRegistration, Transport};

/// What the players chose after a forfeit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostGameDecision {
    /// A new match was started on the same roster and channel
    Restart,
    /// The session was ended
    Ended,
    /// Nobody answered in time; the session was ended
    Abandoned,
}

/// Shows the post-game panel in the session channel and applies the first
/// valid choice.
///
/// Presses arriving after the decision are answered with
/// [`GameError::NotFound`] once the session is gone.
///
/// # Returns
///
/// The decision. The session is already destroyed for
/// [`PostGameDecision::Ended`] and [`PostGameDecision::Abandoned`].
///
/// # Errors
///
/// - [`GameError::UnsupportedControl`] if a post-game panel is already open
///   in the session channel
/// - [`GameError::Transport`] if the chat fails. A failed restart also ends
///   the session, since its new match could not be announced.
pub async fn run_post_game(
    transport: &dyn Transport,
    board: &ControlBoard,
    manager: &SessionManager,
    session: &SessionHandle,
    settings: &GameSettings,
) -> Result<PostGameDecision, GameError> {
    let (guild, channel) = {
        let session = session.lock().await;
        (session.guild.clone(), session.channel.clone())
    };

    let mut registration = board
        .register(&channel, PanelFamily::PostGame)
        .ok_or(GameError::UnsupportedControl)?;

    let result = decide(transport, manager, &mut registration, session, settings).await;

    board.unregister(&registration);
    for interaction in registration.drain() {
        let error = if manager.contains(&guild).await {
            GameError::UnsupportedControl
        } else {
            GameError::NotFound
        };
        reject(transport, &interaction, &error).await;
    }

    result
}

async fn decide(
    transport: &dyn Transport,
    manager: &SessionManager,
    registration: &mut PanelRegistration,
    session: &SessionHandle,
    settings: &GameSettings,
) -> Result<PostGameDecision, GameError> {
    let (guild, home, channel) = {
        let session = session.lock().await;
        (
            session.guild.clone(),
            session.home.clone(),
            session.channel.clone(),
        )
    };

    let handle = transport
        .send_panel(&channel, render::post_game_panel(true))
        .await?;

    loop {
        let Some(interaction) = registration.next(settings.post_game_timeout).await else {
            info!("post-game panel of {} expired", guild);
            manager.teardown(session).await;
            transport
                .send_message(&home, render::session_abandoned())
                .await?;
            return Ok(PostGameDecision::Abandoned);
        };

        match interaction.action {
            ControlAction::Restart => match manager.restart(&guild).await {
                Ok(()) => {
                    transport
                        .edit_panel(&handle, render::post_game_panel(false))
                        .await?;
                    transport
                        .send_ephemeral(&interaction.notice_target(), render::RESTART_NOTICE)
                        .await?;
                    return Ok(PostGameDecision::Restart);
                }
                Err(GameError::NotFound) => {
                    reject(transport, &interaction, &GameError::NotFound).await;
                    return Ok(PostGameDecision::Ended);
                }
                Err(e) => {
                    // The new match was never announced, nobody can play it
                    reject(transport, &interaction, &e).await;
                    manager.teardown(session).await;
                    return Err(e);
                }
            },
            ControlAction::End => {
                if !manager.contains(&guild).await {
                    reject(transport, &interaction, &GameError::NotFound).await;
                    return Ok(PostGameDecision::Ended);
                }
                // The notice must go out before its channel disappears
                if let Err(e) = transport
                    .send_ephemeral(&interaction.notice_target(), render::END_NOTICE)
                    .await
                {
                    warn!("failed to answer {}: {:?}", interaction.user.id, e);
                }
                manager.teardown(session).await;
                transport
                    .send_message(&home, render::session_ended())
                    .await?;
                return Ok(PostGameDecision::Ended);
            }
            _ => reject(transport, &interaction, &GameError::UnsupportedControl).await,
        }
    }
}

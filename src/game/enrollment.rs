//! Interactive gathering of the participants of a match.
//!
//! The enrollment panel offers three controls: `join`, `leave` and `begin`.
//! The roster is re-rendered on every change so every viewer sees the same
//! list. `begin` finalizes the roster once it is large enough; if nobody
//! presses it before the idle timeout the enrollment is abandoned.

use log::{debug, error, info};

use crate::game::GameSettings;
use crate::game::error::GameError;
use crate::game::render;
use crate::transport::{
    ChannelId, ControlAction, ControlBoard, Interaction, PanelFamily, PanelRegistration, Player,
    Transport,
};

/// Candidates of an enrollment, in join order.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    candidates: Vec<Player>,
}

impl Roster {
    /// An empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player. Returns `false` if they were already enrolled.
    pub fn join(&mut self, player: &Player) -> bool {
        if self.candidates.contains(player) {
            return false;
        }
        self.candidates.push(player.clone());
        true
    }

    /// Removes a player. Returns `false` if they were not enrolled.
    pub fn leave(&mut self, player: &Player) -> bool {
        let before = self.candidates.len();
        self.candidates.retain(|candidate| candidate != player);
        self.candidates.len() != before
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn players(&self) -> &[Player] {
        &self.candidates
    }

    pub fn into_players(self) -> Vec<Player> {
        self.candidates
    }
}

/// Effect of a press on the enrollment.
#[derive(Debug)]
pub enum EnrollmentStep {
    /// The roster changed and must be re-rendered
    Changed,
    /// Nothing changed
    Unchanged,
    /// The press is refused, only the presser is told
    Rejected(GameError),
    /// The roster is final
    Finalized,
}

/// Roster-building state machine, without any I/O.
#[derive(Debug)]
pub struct Enrollment {
    initiator: Player,
    roster: Roster,
    min_players: usize,
}

impl Enrollment {
    /// Opens an empty enrollment.
    ///
    /// # Arguments
    ///
    /// * `initiator` - The user who asked for the game; not enrolled by default
    /// * `min_players` - Smallest roster `begin` accepts
    pub fn new(initiator: Player, min_players: usize) -> Self {
        Enrollment {
            initiator,
            roster: Roster::new(),
            min_players,
        }
    }

    pub fn initiator(&self) -> &Player {
        &self.initiator
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Applies a press of `player` on `action`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wordchain::game::enrollment::{Enrollment, EnrollmentStep};
    /// use wordchain::transport::{ControlAction, Player};
    ///
    /// let alice = Player::new("@alice:example.com", "Alice");
    /// let mut enrollment = Enrollment::new(alice.clone(), 2);
    ///
    /// assert!(matches!(
    ///     enrollment.handle(ControlAction::Join, &alice),
    ///     EnrollmentStep::Changed
    /// ));
    /// assert!(matches!(
    ///     enrollment.handle(ControlAction::Begin, &alice),
    ///     EnrollmentStep::Rejected(_)
    /// ));
    /// ```
    pub fn handle(&mut self, action: ControlAction, player: &Player) -> EnrollmentStep {
        match action {
            ControlAction::Join => {
                if self.roster.join(player) {
                    EnrollmentStep::Changed
                } else {
                    EnrollmentStep::Unchanged
                }
            }
            ControlAction::Leave => {
                if self.roster.leave(player) {
                    EnrollmentStep::Changed
                } else {
                    EnrollmentStep::Unchanged
                }
            }
            ControlAction::Begin => {
                if self.roster.len() < self.min_players {
                    EnrollmentStep::Rejected(GameError::InsufficientRoster {
                        have: self.roster.len(),
                        need: self.min_players,
                    })
                } else {
                    EnrollmentStep::Finalized
                }
            }
            _ => EnrollmentStep::Rejected(GameError::UnsupportedControl),
        }
    }

    pub fn into_roster(self) -> Roster {
        self.roster
    }
}

/// How an enrollment ended.
#[derive(Debug, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    /// `begin` was accepted with this roster
    Ready(Vec<Player>),
    /// The idle timeout fired; the roster at that time is kept for logging
    Abandoned(Vec<Player>),
}

/// Runs an enrollment in `channel` until it is finalized or abandoned.
///
/// Presses still queued when the enrollment closes are answered with
/// [`GameError::NoOpenEnrollment`].
///
/// # Arguments
///
/// * `transport` - Where the panel is shown and the rejections answered
/// * `board` - Where the panel is registered
/// * `channel` - The home room of the game
/// * `initiator` - The user who asked for the game
/// * `settings` - Idle timeout and roster minimum
///
/// # Errors
///
/// - [`GameError::EnrollmentInProgress`] if an enrollment panel is already
///   open in the channel
/// - [`GameError::Transport`] if the panel cannot be shown or edited
pub async fn run_enrollment(
    transport: &dyn Transport,
    board: &ControlBoard,
    channel: &ChannelId,
    initiator: &Player,
    settings: &GameSettings,
) -> Result<EnrollmentOutcome, GameError> {
    let mut registration = board
        .register(channel, PanelFamily::Enrollment)
        .ok_or(GameError::EnrollmentInProgress)?;

    let result = drive(
        transport,
        &mut registration,
        Enrollment::new(initiator.clone(), settings.min_players),
        settings,
    )
    .await;

    board.unregister(&registration);
    for interaction in registration.drain() {
        reject(transport, &interaction, &GameError::NoOpenEnrollment).await;
    }

    result
}

async fn drive(
    transport: &dyn Transport,
    registration: &mut PanelRegistration,
    mut enrollment: Enrollment,
    settings: &GameSettings,
) -> Result<EnrollmentOutcome, GameError> {
    let channel = registration.channel().clone();
    let handle = transport
        .send_panel(&channel, render::enrollment_panel(&[], true))
        .await?;
    info!(
        "enrollment opened in {} by {}",
        channel,
        enrollment.initiator().id
    );

    loop {
        let Some(interaction) = registration.next(settings.enrollment_timeout).await else {
            let roster = enrollment.into_roster();
            info!(
                "enrollment in {} abandoned with {} participant(s)",
                channel,
                roster.len()
            );
            transport
                .edit_panel(&handle, render::enrollment_panel(roster.players(), false))
                .await?;
            return Ok(EnrollmentOutcome::Abandoned(roster.into_players()));
        };

        match enrollment.handle(interaction.action, &interaction.user) {
            EnrollmentStep::Changed => {
                debug!(
                    "enrollment in {}: {:?} by {}",
                    channel, interaction.action, interaction.user.id
                );
                transport
                    .edit_panel(
                        &handle,
                        render::enrollment_panel(enrollment.roster().players(), true),
                    )
                    .await?;
            }
            EnrollmentStep::Unchanged => {}
            EnrollmentStep::Rejected(error) => reject(transport, &interaction, &error).await,
            EnrollmentStep::Finalized => {
                let roster = enrollment.into_roster();
                info!(
                    "enrollment in {} finalized with {} participants",
                    channel,
                    roster.len()
                );
                transport
                    .edit_panel(&handle, render::enrollment_panel(roster.players(), false))
                    .await?;
                return Ok(EnrollmentOutcome::Ready(roster.into_players()));
            }
        }
    }
}

/// Answers a refused press to its presser only.
pub(crate) async fn reject(
    transport: &dyn Transport,
    interaction: &Interaction,
    error: &GameError,
) {
    if let Err(e) = transport
        .send_ephemeral(&interaction.notice_target(), &error.user_message())
        .await
    {
        error!("failed to answer {}: {:?}", interaction.user.id, e);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::transport::testing::RecordingTransport;

    fn alice() -> Player {
        Player::new("@alice:example.com", "Alice")
    }

    fn bob() -> Player {
        Player::new("@bob:example.com", "Bob")
    }

    fn press(user: Player, action: ControlAction) -> Interaction {
        Interaction {
            channel: ChannelId::from("!home"),
            user,
            action,
            event_id: "$press".to_string(),
        }
    }

    async fn wait_until_registered(board: &ControlBoard) {
        while !board.is_registered(&ChannelId::from("!home"), PanelFamily::Enrollment) {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut roster = Roster::new();
        assert!(roster.join(&alice()));
        assert!(!roster.join(&alice()));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_leave_non_member_is_noop() {
        let mut roster = Roster::new();
        roster.join(&alice());
        assert!(!roster.leave(&bob()));
        assert_eq!(roster.players(), [alice()]);
        assert!(roster.leave(&alice()));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_roster_keeps_join_order() {
        let mut roster = Roster::new();
        roster.join(&bob());
        roster.join(&alice());
        assert_eq!(roster.into_players(), vec![bob(), alice()]);
    }

    #[test]
    fn test_begin_below_minimum_is_rejected() {
        let mut enrollment = Enrollment::new(alice(), 2);
        enrollment.handle(ControlAction::Join, &alice());

        let step = enrollment.handle(ControlAction::Begin, &alice());

        assert!(matches!(
            step,
            EnrollmentStep::Rejected(GameError::InsufficientRoster { have: 1, need: 2 })
        ));
        assert_eq!(enrollment.roster().len(), 1);
    }

    #[test]
    fn test_begin_with_enough_players() {
        let mut enrollment = Enrollment::new(alice(), 2);
        enrollment.handle(ControlAction::Join, &alice());
        enrollment.handle(ControlAction::Join, &bob());

        assert!(matches!(
            enrollment.handle(ControlAction::Begin, &bob()),
            EnrollmentStep::Finalized
        ));
    }

    #[test]
    fn test_post_game_controls_are_unsupported() {
        let mut enrollment = Enrollment::new(alice(), 2);
        assert!(matches!(
            enrollment.handle(ControlAction::Restart, &alice()),
            EnrollmentStep::Rejected(GameError::UnsupportedControl)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrollment_flow() {
        let transport = Arc::new(RecordingTransport::new());
        let board = Arc::new(ControlBoard::new());
        let settings = GameSettings::default();

        let task = {
            let transport = Arc::clone(&transport);
            let board = Arc::clone(&board);
            tokio::spawn(async move {
                run_enrollment(
                    transport.as_ref(),
                    &board,
                    &ChannelId::from("!home"),
                    &alice(),
                    &settings,
                )
                .await
            })
        };
        wait_until_registered(&board).await;

        for interaction in [
            press(alice(), ControlAction::Join),
            press(alice(), ControlAction::Join),
            press(alice(), ControlAction::Begin),
            press(bob(), ControlAction::Join),
            press(bob(), ControlAction::Begin),
        ] {
            board.dispatch(interaction).await.unwrap();
        }

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, EnrollmentOutcome::Ready(vec![alice(), bob()]));

        // Two joins changed the roster, the closing edit comes last
        assert_eq!(transport.edits(), 3);
        assert_eq!(
            transport.ephemerals(),
            vec!["At least 2 participants are needed to start the game (currently 1).".to_string()]
        );
        let panel = transport.panels().pop().unwrap();
        assert!(panel.controls.is_empty());
        assert_eq!(panel.lines, vec!["1. Alice", "2. Bob"]);
        assert!(!board.is_registered(&ChannelId::from("!home"), PanelFamily::Enrollment));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrollment_abandoned_on_idle_timeout() {
        let transport = RecordingTransport::new();
        let board = ControlBoard::new();
        let settings = GameSettings {
            enrollment_timeout: Duration::from_secs(180),
            ..GameSettings::default()
        };

        let outcome = run_enrollment(
            &transport,
            &board,
            &ChannelId::from("!home"),
            &alice(),
            &settings,
        )
        .await
        .unwrap();

        assert_eq!(outcome, EnrollmentOutcome::Abandoned(vec![]));
        assert!(!board.is_registered(&ChannelId::from("!home"), PanelFamily::Enrollment));
    }

    #[tokio::test]
    async fn test_second_enrollment_in_same_channel() {
        let transport = RecordingTransport::new();
        let board = ControlBoard::new();
        let _open = board
            .register(&ChannelId::from("!home"), PanelFamily::Enrollment)
            .unwrap();

        let result = run_enrollment(
            &transport,
            &board,
            &ChannelId::from("!home"),
            &alice(),
            &GameSettings::default(),
        )
        .await;

        assert!(matches!(result, Err(GameError::EnrollmentInProgress)));
        assert!(transport.sent().is_empty());
    }
}

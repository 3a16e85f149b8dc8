//! Button-style polls.
//!
//! A poll is created with a title and its options, shown as a panel, opened
//! by its creator, voted on with one control per option and closed by its
//! creator, which posts the ranked results. It uses the `Poll` slot of the
//! [`ControlBoard`], so a room has at most one running poll.

use std::sync::Arc;

use log::{debug, error, info};
use thiserror::Error;

use crate::config::PollConfig;
use crate::transport::{
    ChannelId, ControlAction, ControlBoard, Interaction, NoticeTarget, Outgoing, PanelFamily,
    PanelRegistration, Player, Transport,
};

mod ballot;

pub use crate::poll::ballot::{Poll, PollState};

/// Failures of poll operations.
///
/// Every variant but [`PollError::Transport`] is answered to the user who
/// triggered it and leaves the poll unchanged.
#[derive(Debug, Error)]
pub enum PollError {
    /// Fewer non-blank options than the configured minimum
    #[error("At least {need} options are needed to create a poll.")]
    InsufficientOptions { need: usize },
    /// A poll panel is already registered in the room
    #[error("A poll is already running here.")]
    AlreadyRunning,
    /// A poll control pressed in a room without poll
    #[error("There is no poll running here.")]
    NoActivePoll,
    #[error("Only the creator of the poll can do this.")]
    NotCreator,
    #[error("The poll is already open.")]
    AlreadyOpen,
    #[error("The poll is not open.")]
    NotOpen,
    #[error("There is no option {0}.")]
    InvalidOption(usize),
    /// The chat transport failed; the poll is abandoned
    #[error("transport failure: {0}")]
    Transport(#[from] anyhow::Error),
}

impl PollError {
    /// Text shown to the user who triggered the error.
    pub fn user_message(&self) -> String {
        match self {
            PollError::Transport(_) => "Something went wrong, please try again later.".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Tunables of the polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Smallest number of options a poll can be created with
    pub min_options: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings { min_options: 2 }
    }
}

impl From<&PollConfig> for PollSettings {
    fn from(config: &PollConfig) -> Self {
        PollSettings {
            min_options: config.min_options,
        }
    }
}

/// Runs the polls of every room.
///
/// Like the word-chain game, each poll is driven by the task of the message
/// that created it, and the votes reach it through the shared
/// [`ControlBoard`].
pub struct Polls {
    transport: Arc<dyn Transport>,
    board: Arc<ControlBoard>,
    settings: PollSettings,
}

impl Polls {
    /// Creates the poll controller.
    ///
    /// # Arguments
    ///
    /// * `transport` - Where the panels, results and rejections are sent
    /// * `board` - Control dispatch table, shared with the word-chain game
    /// * `settings` - Minimum number of options
    pub fn new(
        transport: Arc<dyn Transport>,
        board: Arc<ControlBoard>,
        settings: PollSettings,
    ) -> Self {
        Polls {
            transport,
            board,
            settings,
        }
    }

    /// Runs a poll in `channel` until its creator closes it.
    ///
    /// Blank options are ignored.
    ///
    /// # Arguments
    ///
    /// * `channel` - The room of the poll
    /// * `creator` - The user who created it
    /// * `title` - The question
    /// * `options` - The choices, in display order
    ///
    /// # Errors
    ///
    /// - [`PollError::InsufficientOptions`] or [`PollError::AlreadyRunning`],
    ///   before anything is shown
    /// - [`PollError::Transport`] if the panel or the results cannot be sent
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wordchain::poll::Polls;
    /// use wordchain::transport::{ChannelId, Player};
    ///
    /// # async fn example(polls: Polls) -> Result<(), wordchain::poll::PollError> {
    /// let alice = Player::new("@alice:example.com", "Alice");
    /// polls
    ///     .run(
    ///         &ChannelId::from("!room:example.com"),
    ///         &alice,
    ///         "Lunch",
    ///         vec!["Pizza".to_string(), "Sushi".to_string()],
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(
        &self,
        channel: &ChannelId,
        creator: &Player,
        title: &str,
        options: Vec<String>,
    ) -> Result<(), PollError> {
        let options: Vec<String> = options
            .into_iter()
            .map(|option| option.trim().to_owned())
            .filter(|option| !option.is_empty())
            .collect();
        if options.len() < self.settings.min_options {
            return Err(PollError::InsufficientOptions {
                need: self.settings.min_options,
            });
        }

        let mut registration = self
            .board
            .register(channel, PanelFamily::Poll)
            .ok_or(PollError::AlreadyRunning)?;

        let mut poll = Poll::new(title.to_owned(), options, creator.clone());
        let result = self.drive(&mut poll, &mut registration).await;

        self.board.unregister(&registration);
        for interaction in registration.drain() {
            self.reject(&interaction, &PollError::NoActivePoll).await;
        }

        result
    }

    async fn drive(
        &self,
        poll: &mut Poll,
        registration: &mut PanelRegistration,
    ) -> Result<(), PollError> {
        let channel = registration.channel().clone();
        let handle = self.transport.send_panel(&channel, poll.panel()).await?;
        info!("poll \"{}\" created in {} by {}", poll.title(), channel, poll.creator().id);

        while let Some(interaction) = registration.recv().await {
            let applied = match interaction.action {
                ControlAction::PollOpen => poll.open(&interaction.user),
                ControlAction::PollVote(option) => poll.vote(&interaction.user, option),
                ControlAction::PollClose => poll.close(&interaction.user),
                _ => Err(PollError::NoActivePoll),
            };

            if let Err(e) = applied {
                self.reject(&interaction, &e).await;
                continue;
            }
            debug!(
                "poll in {}: {:?} by {}",
                channel, interaction.action, interaction.user.id
            );

            self.transport.edit_panel(&handle, poll.panel()).await?;
            if poll.state() == PollState::Closed {
                info!("poll \"{}\" closed in {}", poll.title(), channel);
                self.transport
                    .send_message(&channel, Outgoing::text(poll.results()))
                    .await?;
                return Ok(());
            }
        }

        Ok(())
    }

    /// Routes a press on a poll control to the poll of its room.
    ///
    /// A press in a room without poll is answered with
    /// [`PollError::NoActivePoll`].
    pub async fn on_interaction(&self, interaction: Interaction) {
        if let Err(interaction) = self.board.dispatch(interaction).await {
            self.reject(&interaction, &PollError::NoActivePoll).await;
        }
    }

    /// Answers a failed [`Polls::run`] to its creator.
    pub async fn report(&self, target: &NoticeTarget, error: PollError) {
        if let PollError::Transport(e) = &error {
            error!("poll in {} failed: {:?}", target.channel, e);
        }
        if let Err(e) = self
            .transport
            .send_ephemeral(target, &error.user_message())
            .await
        {
            error!("failed to answer {}: {:?}", target.user, e);
        }
    }

    async fn reject(&self, interaction: &Interaction, error: &PollError) {
        if let Err(e) = self
            .transport
            .send_ephemeral(&interaction.notice_target(), &error.user_message())
            .await
        {
            error!("failed to answer {}: {:?}", interaction.user.id, e);
        }
    }
}

//! Chat transport abstraction used by the game and poll controllers.
//!
//! The controllers never talk to Matrix directly. They go through the
//! [`Transport`] trait for everything that leaves the process (messages,
//! panels, notices, channel provisioning), through the [`MessageHub`] to wait
//! for a player's next message, and through the [`ControlBoard`] to receive
//! presses on the interactive controls of a panel.
//!
//! # Value types
//!
//! Identifiers are opaque string newtypes so that the core stays independent
//! of the chat protocol:
//!
//! - [`GuildId`] - the server owning a match (the home room on Matrix)
//! - [`ChannelId`] - a room where messages are exchanged
//! - [`UserId`] - a chat account

use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use mockall::automock;

mod board;
mod hub;
#[cfg(test)]
pub mod testing;

pub use crate::transport::board::{ControlBoard, PanelFamily, PanelRegistration};
pub use crate::transport::hub::{MessageHub, WaitOutcome};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            /// The raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }
    };
}

string_id!(
    /// Identifier of the server a match belongs to.
    GuildId
);
string_id!(
    /// Identifier of a room.
    ChannelId
);
string_id!(
    /// Identifier of a chat account.
    UserId
);

/// A chat participant.
///
/// Two players are equal when their ids are equal; the display name is only
/// used for rendering and may change between messages.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: UserId,
    pub display_name: String,
}

impl Player {
    /// Creates a player.
    ///
    /// # Arguments
    ///
    /// * `id` - Chat account of the player, used for equality
    /// * `display_name` - Name shown in the rendered texts
    ///
    /// # Examples
    ///
    /// ```
    /// use wordchain::transport::Player;
    ///
    /// let alice = Player::new("@alice:example.com", "Alice");
    /// assert_eq!(alice.to_string(), "Alice");
    /// assert_eq!(alice, Player::new("@alice:example.com", "Alice (away)"));
    /// ```
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Player {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Player {}

impl Hash for Player {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Reference to a message sent by the bot, used to edit it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub channel: ChannelId,
    pub event_id: String,
}

/// A plain text message received from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub channel: ChannelId,
    pub author: Player,
    pub body: String,
    pub event_id: String,
}

/// Actions carried by the interactive controls of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    /// Enter the roster of an enrollment
    Join,
    /// Leave the roster of an enrollment
    Leave,
    /// Finalize the roster and start the match
    Begin,
    /// Play again with the same roster and channel
    Restart,
    /// Close the session
    End,
    PollOpen,
    /// Vote for the option at this zero-based index
    PollVote(usize),
    PollClose,
}

impl ControlAction {
    /// The panel family that owns this action.
    ///
    /// A press is only ever routed to a panel of this family, in the channel
    /// it was made in.
    ///
    /// # Examples
    ///
    /// ```
    /// use wordchain::transport::{ControlAction, PanelFamily};
    ///
    /// assert_eq!(ControlAction::Begin.family(), PanelFamily::Enrollment);
    /// assert_eq!(ControlAction::End.family(), PanelFamily::PostGame);
    /// ```
    pub fn family(&self) -> PanelFamily {
        match self {
            ControlAction::Join | ControlAction::Leave | ControlAction::Begin => {
                PanelFamily::Enrollment
            }
            ControlAction::Restart | ControlAction::End => PanelFamily::PostGame,
            ControlAction::PollOpen | ControlAction::PollVote(_) | ControlAction::PollClose => {
                PanelFamily::Poll
            }
        }
    }
}

/// One interactive control rendered on a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub action: ControlAction,
    pub label: String,
}

impl Control {
    /// Creates a control labelled `label` that emits `action` when pressed.
    pub fn new(action: ControlAction, label: impl Into<String>) -> Self {
        Control {
            action,
            label: label.into(),
        }
    }
}

/// A structured message with a title, content lines and controls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Panel {
    pub title: String,
    pub lines: Vec<String>,
    pub controls: Vec<Control>,
}

/// A text message to send, with the users it mentions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outgoing {
    pub body: String,
    pub mentions: Vec<UserId>,
}

impl Outgoing {
    /// A message without mentions.
    pub fn text(body: impl Into<String>) -> Self {
        Outgoing {
            body: body.into(),
            mentions: Vec::new(),
        }
    }

    /// Adds `user` to the mentioned users.
    ///
    /// # Examples
    ///
    /// ```
    /// use wordchain::transport::{Outgoing, UserId};
    ///
    /// let bob = UserId::from("@bob:example.com");
    /// let message = Outgoing::text("Next turn: Bob").mention(&bob);
    /// assert_eq!(message.mentions, vec![bob]);
    /// ```
    pub fn mention(mut self, user: &UserId) -> Self {
        self.mentions.push(user.clone());
        self
    }
}

/// Where a notice addressed to a single user goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeTarget {
    pub channel: ChannelId,
    pub user: UserId,
    /// Message the notice answers, if any
    pub event_id: Option<String>,
}

/// A press on a control, attributed to the user who pressed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub channel: ChannelId,
    pub user: Player,
    pub action: ControlAction,
    pub event_id: String,
}

impl Interaction {
    /// Where to answer the presser only.
    pub fn notice_target(&self) -> NoticeTarget {
        NoticeTarget {
            channel: self.channel.clone(),
            user: self.user.id.clone(),
            event_id: Some(self.event_id.clone()),
        }
    }
}

/// Outbound side of the chat protocol.
///
/// Failures are reported as [`anyhow::Error`] and are never retried by the
/// callers.
///
/// The Matrix implementation is [`crate::matrix::MatrixClient`]. Tests use
/// the generated `MockTransport`, or the in-memory recording transport of
/// the `testing` module.
#[automock]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text message to a channel.
    ///
    /// # Arguments
    ///
    /// * `channel` - Destination channel
    /// * `message` - Markdown body and the users it mentions
    ///
    /// # Returns
    ///
    /// A handle on the sent message.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown or the message is refused.
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: Outgoing,
    ) -> anyhow::Result<MessageHandle>;

    /// Sends a panel to a channel.
    ///
    /// The presses on its controls do not come back through the transport:
    /// they reach the [`ControlBoard`] through the bot.
    ///
    /// # Returns
    ///
    /// A handle to pass to [`Transport::edit_panel`].
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown or the panel is refused.
    async fn send_panel(&self, channel: &ChannelId, panel: Panel) -> anyhow::Result<MessageHandle>;

    /// Replaces the content of a panel previously sent with [`Transport::send_panel`].
    ///
    /// # Errors
    ///
    /// Returns an error if the edit is refused.
    async fn edit_panel(&self, handle: &MessageHandle, panel: Panel) -> anyhow::Result<()>;

    /// Sends a notice meant for a single user.
    ///
    /// Protocols without private notices answer the message of the user in
    /// the channel instead.
    ///
    /// # Arguments
    ///
    /// * `target` - The user, their channel and the message being answered
    /// * `body` - Markdown text of the notice
    ///
    /// # Errors
    ///
    /// Returns an error if the notice cannot be sent.
    async fn send_ephemeral(&self, target: &NoticeTarget, body: &str) -> anyhow::Result<()>;

    /// Creates a channel only `allowed` players (and the bot) can access.
    ///
    /// # Arguments
    ///
    /// * `guild` - The guild the channel is created for
    /// * `name` - Display name of the channel
    /// * `allowed` - Players granted access
    ///
    /// # Returns
    ///
    /// The id of the new channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be created; nothing is left
    /// behind in that case.
    async fn create_restricted_channel(
        &self,
        guild: &GuildId,
        name: &str,
        allowed: &[Player],
    ) -> anyhow::Result<ChannelId>;

    /// Deletes a channel created with [`Transport::create_restricted_channel`].
    ///
    /// # Arguments
    ///
    /// * `channel` - The channel to delete
    /// * `members` - Players that were granted access, removed first
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be deleted.
    async fn delete_channel(&self, channel: &ChannelId, members: &[Player]) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_equality_ignores_display_name() {
        let a = Player::new("@alice:example.com", "Alice");
        let renamed = Player::new("@alice:example.com", "Alice (away)");
        let b = Player::new("@bob:example.com", "Alice");

        assert_eq!(a, renamed);
        assert_ne!(a, b);
    }

    #[test]
    fn test_action_family() {
        assert_eq!(ControlAction::Join.family(), PanelFamily::Enrollment);
        assert_eq!(ControlAction::Begin.family(), PanelFamily::Enrollment);
        assert_eq!(ControlAction::Restart.family(), PanelFamily::PostGame);
        assert_eq!(ControlAction::End.family(), PanelFamily::PostGame);
        assert_eq!(ControlAction::PollVote(3).family(), PanelFamily::Poll);
        assert_eq!(ControlAction::PollClose.family(), PanelFamily::Poll);
    }

    #[test]
    fn test_outgoing_mentions() {
        let user = UserId::from("@alice:example.com");
        let message = Outgoing::text("your turn").mention(&user);

        assert_eq!(message.body, "your turn");
        assert_eq!(message.mentions, vec![user]);
    }
}

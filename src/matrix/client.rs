//! Matrix client wrapper implementing the chat transport.
//!
//! This module provides the [`MatrixClient`] which wraps the Matrix SDK
//! client, runs the synchronization and realises every
//! [`Transport`] operation with Matrix primitives:
//!
//! | Operation | Matrix |
//! |-----------|--------|
//! | message | `m.room.message` Markdown text with `m.mentions` |
//! | panel | Markdown message listing the commands of its controls |
//! | panel edit | `m.replace` event targeting the panel |
//! | ephemeral notice | reply to the message of the user |
//! | restricted channel | private room inviting the players |
//! | channel deletion | kick the players, then leave the room |
//!
//! A private room only invites its players: they see it once they accept
//! the invitation. The first turn of a match starts with the announcement,
//! so its timer also covers the time the first player takes to join.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use matrix_sdk::{
    Client, Room,
    ruma::{
        EventId, OwnedUserId, RoomId, UserId as MatrixUserId,
        api::client::room::create_room::v3::{Request as CreateRoomRequest, RoomPreset},
        events::{
            Mentions,
            room::message::{
                AddMentions, ForwardThread, ReplacementMetadata, ReplyMetadata,
                RoomMessageEventContent, RoomMessageEventContentWithoutRelation,
            },
        },
    },
};

use crate::commands::format_panel;
use crate::matrix::{
    ReceivedText, UserCredentials, login::setup_client, session::SessionStore, sync::MatrixSync,
};
use crate::transport::{
    ChannelId, GuildId, MessageHandle, NoticeTarget, Outgoing, Panel, Player, Transport, UserId,
};

/// Display name of the bot account.
const DISPLAY_NAME: &str = "Word Chain";

/// Matrix client of the bot.
///
/// Shared by the sync loop and, as a [`Transport`], by the game and poll
/// controllers.
pub struct MatrixClient {
    /// Sync loop, started by [`MatrixClient::sync`]
    matrix_sync: MatrixSync,
    /// The logged in matrix client
    client: Client,
}

impl MatrixClient {
    /// Logs in (or restores the session stored in `data_path`) and prepares
    /// the synchronization.
    ///
    /// # Arguments
    ///
    /// * `user_credentials` - Account of the bot
    /// * `data_path` - Directory of the session file and the sqlite store
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be opened, or if the
    /// login or the session restoration fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wordchain::matrix::{MatrixClient, UserCredentials};
    ///
    /// # async fn example() -> Result<(), anyhow::Error> {
    /// let credentials = UserCredentials {
    ///     user_id: "@wordchain:matrix.org".to_string(),
    ///     password: "secret".to_string(),
    ///     store_passphrase: None,
    /// };
    /// let client = MatrixClient::new(&credentials, "./wordchain-data/session").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(
        user_credentials: &UserCredentials,
        data_path: &str,
    ) -> Result<Self, anyhow::Error> {
        let store = SessionStore::open(data_path)
            .await
            .context("failed to open matrix session")?;

        let client = setup_client(user_credentials, &store)
            .await
            .context("failed to setup matrix client")?;

        if let Err(e) = client.account().set_display_name(Some(DISPLAY_NAME)).await {
            warn!("failed to set display name: {:?}", e);
        }

        let matrix_sync = MatrixSync::new(&client, &store);

        Ok(MatrixClient {
            matrix_sync,
            client,
        })
    }

    /// Runs the Matrix sync loop, calling `on_message` for each new text message.
    pub async fn sync<F>(&self, on_message: F) -> Result<(), anyhow::Error>
    where
        F: Fn(ReceivedText) + Send + Sync + 'static,
    {
        match self.matrix_sync.sync(on_message).await {
            Ok(_) => info!("matrix sync ended successfully"),
            Err(e) => error!("matrix sync ended with error: {:?}", e),
        }

        Ok(())
    }

    /// The joined room behind `channel`.
    fn room(&self, channel: &ChannelId) -> Result<Room, anyhow::Error> {
        let room_id = RoomId::parse(channel.as_str())?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| anyhow!("unknown room {}", channel))
    }

    /// Sends `content` to `channel` and returns a handle on the new event.
    async fn send(
        &self,
        channel: &ChannelId,
        content: RoomMessageEventContent,
    ) -> Result<MessageHandle, anyhow::Error> {
        let room = self.room(channel)?;
        let result = room.send(content).await?;

        Ok(MessageHandle {
            channel: channel.clone(),
            event_id: result.event_id.to_string(),
        })
    }
}

fn parse_user_ids<'a>(
    users: impl IntoIterator<Item = &'a UserId>,
) -> Result<Vec<OwnedUserId>, anyhow::Error> {
    users
        .into_iter()
        .map(|user| MatrixUserId::parse(user.as_str()).map_err(anyhow::Error::from))
        .collect()
}

#[async_trait]
impl Transport for MatrixClient {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: Outgoing,
    ) -> anyhow::Result<MessageHandle> {
        let mut content = RoomMessageEventContent::text_markdown(&message.body);
        if !message.mentions.is_empty() {
            content = content.add_mentions(Mentions::with_user_ids(parse_user_ids(
                &message.mentions,
            )?));
        }

        self.send(channel, content).await
    }

    async fn send_panel(&self, channel: &ChannelId, panel: Panel) -> anyhow::Result<MessageHandle> {
        let content = RoomMessageEventContent::text_markdown(format_panel(&panel));
        self.send(channel, content).await
    }

    async fn edit_panel(&self, handle: &MessageHandle, panel: Panel) -> anyhow::Result<()> {
        let event_id = EventId::parse(&handle.event_id)?;
        let content = RoomMessageEventContentWithoutRelation::text_markdown(format_panel(&panel))
            .make_replacement(ReplacementMetadata::new(event_id, None));

        self.send(&handle.channel, content).await?;
        Ok(())
    }

    async fn send_ephemeral(&self, target: &NoticeTarget, body: &str) -> anyhow::Result<()> {
        let user = MatrixUserId::parse(target.user.as_str())?;

        // Matrix has no message visible to a single member: answer the message
        // of the user, or mention them
        let content = match &target.event_id {
            Some(event_id) => {
                let event = EventId::parse(event_id)?;
                RoomMessageEventContent::text_markdown(body).make_reply_to(
                    ReplyMetadata::new(&event, &user, None),
                    ForwardThread::No,
                    AddMentions::No,
                )
            }
            None => RoomMessageEventContent::text_markdown(body)
                .add_mentions(Mentions::with_user_ids([user])),
        };

        self.send(&target.channel, content).await?;
        Ok(())
    }

    /// Creates a private room inviting `allowed`.
    ///
    /// The players are only invited: the room is usable by the bot right
    /// away, by each player once they accept the invitation.
    async fn create_restricted_channel(
        &self,
        guild: &GuildId,
        name: &str,
        allowed: &[Player],
    ) -> anyhow::Result<ChannelId> {
        let mut request = CreateRoomRequest::new();
        request.name = Some(name.to_owned());
        request.topic = Some(format!("Word-chain game started in {}", guild));
        request.preset = Some(RoomPreset::PrivateChat);
        request.invite = parse_user_ids(allowed.iter().map(|player| &player.id))?;

        let room = self.client.create_room(request).await?;
        info!("created room {} for {}", room.room_id(), guild);

        Ok(ChannelId::from(room.room_id().to_string()))
    }

    async fn delete_channel(&self, channel: &ChannelId, members: &[Player]) -> anyhow::Result<()> {
        let room = self.room(channel)?;

        for member in members {
            let user = MatrixUserId::parse(member.id.as_str())?;
            if let Err(e) = room.kick_user(&user, Some("The game has ended")).await {
                // A player may already have left the room
                debug!("failed to kick {} from {}: {:?}", member.id, channel, e);
            }
        }

        room.leave().await?;
        info!("left room {}", channel);
        Ok(())
    }
}

//! Matrix client synchronization and event handling.
//!
//! The [`MatrixSync::sync`] method:
//! 1. Performs an initial sync to catch up on offline events (especially invites)
//! 2. Sets up event handlers for auto-joining rooms and message processing
//! 3. Enters a continuous sync loop with automatic token persistence
//!
//! Only the text messages sent after the initial sync by somebody else than
//! the bot reach the message callback.
//!
//! # Example
//!
//! ```no_run
//! use wordchain::matrix::session::SessionStore;
//! use wordchain::matrix::sync::MatrixSync;
//! use matrix_sdk::Client;
//!
//! # async fn example(client: Client, store: SessionStore) -> Result<(), anyhow::Error> {
//! let matrix_sync = MatrixSync::new(&client, &store);
//!
//! matrix_sync.sync(|text| {
//!     println!("{} in {}: {}", text.sender_name, text.room_id, text.body);
//! }).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::sync::Arc;

use log::{error, info, warn};
use matrix_sdk::{
    Client, LoopCtrl, Room, RoomState,
    config::SyncSettings,
    ruma::{
        UserId,
        api::client::filter::FilterDefinition,
        events::room::{
            member::StrippedRoomMemberEvent,
            message::{MessageType, OriginalSyncRoomMessageEvent, Relation},
        },
    },
};
use tokio::time::{Duration, sleep};

use crate::matrix::{ReceivedText, session::SessionStore};

/// Seconds between two attempts of the initial sync.
const INITIAL_SYNC_RETRY_DELAY: u64 = 5;

/// Manages the synchronization of the Matrix client.
///
/// Owns the sync loop of the bot: catch-up of the invitations received while
/// offline, automatic join of the invited rooms, delivery of the new text
/// messages and persistence of the sync token.
pub struct MatrixSync {
    /// The logged in matrix client
    client: Client,
    /// Where the sync token is persisted
    store: SessionStore,
}

impl MatrixSync {
    /// Creates a new MatrixSync instance.
    ///
    /// This does not start the synchronization; call [`MatrixSync::sync`].
    ///
    /// # Arguments
    ///
    /// * `client` - The authenticated Matrix client
    /// * `store` - The session store used to persist the sync token
    pub fn new(client: &Client, store: &SessionStore) -> Self {
        MatrixSync {
            client: client.to_owned(),
            store: store.to_owned(),
        }
    }

    /// Runs the sync loop, calling `on_message` for every new text message.
    ///
    /// This method performs the following sequence:
    /// 1. Registers an auto-join handler for room invitations
    /// 2. Performs an initial sync, retried until it succeeds, to process the
    ///    invitations received while offline
    /// 3. Registers the message handler with the provided callback
    /// 4. Enters the sync loop, persisting the token after each response
    ///
    /// # Arguments
    ///
    /// * `on_message` - Callback invoked for each text message of a joined
    ///   room, except the messages of the bot and the edits. It must not
    ///   block: the bot spawns a task per message.
    ///
    /// # Errors
    ///
    /// Only returns when the sync loop fails.
    pub async fn sync<F>(&self, on_message: F) -> Result<()>
    where
        F: Fn(ReceivedText) + Send + Sync + 'static,
    {
        info!("start syncing");

        // Auto join rooms when invited
        self.client.add_event_handler(auto_join_rooms);

        // Enable room members lazy-loading
        // See <https://spec.matrix.org/v1.6/client-server-api/#lazy-loading-room-members>.
        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());

        // Get the last sync token from the session if it exists
        if let Some(sync_token) = self.store.sync_token() {
            sync_settings = sync_settings.token(sync_token);
        }

        // First sync to only get the invitations received while the bot was offline
        let response = loop {
            match self.client.sync_once(sync_settings.clone()).await {
                Ok(response) => break response,
                Err(error) => {
                    error!("an error occurred during initial sync: {error}");
                    error!("trying again in {INITIAL_SYNC_RETRY_DELAY}s");
                    sleep(Duration::from_secs(INITIAL_SYNC_RETRY_DELAY)).await;
                }
            }
        };
        if let Err(err) = self.store.save_sync_token(response.next_batch.clone()).await {
            error!("failed to persist sync token: {:?}", err);
        }

        let on_message = Arc::new(on_message);

        // Listen to incoming room messages. Because we are listening after the sync_once,
        // we only get new messages.
        self.client.add_event_handler(
            move |event: OriginalSyncRoomMessageEvent, room: Room, client: Client| {
                let on_message = Arc::clone(&on_message);
                async move { on_room_message(event, room, client, on_message.as_ref()).await }
            },
        );

        // Since we called `sync_once` before we entered our sync loop we must pass
        // that sync token to `sync_with_result_callback`
        sync_settings = sync_settings.token(response.next_batch);

        self.client
            .sync_with_result_callback(sync_settings, |sync_result| async move {
                let response = sync_result?;

                // We persist the token each time to be able to restore our session
                if let Err(err) = self.store.save_sync_token(response.next_batch).await {
                    error!("failed to persist sync token: {:?}", err);
                }

                Ok(LoopCtrl::Continue)
            })
            .await?;

        Ok(())
    }
}

/// Joins the rooms the bot is invited to.
///
/// The join is retried with an exponential backoff, up to an hour between
/// two attempts.
async fn auto_join_rooms(room_member: StrippedRoomMemberEvent, client: Client, room: Room) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    // Ignore if the invite is not for us
    if room_member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(err) = room.join().await {
            // retry autojoin due to synapse sending invites, before the
            // invited user can join for more information see
            // https://github.com/matrix-org/synapse/issues/4345
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > 3600 {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }
        info!("successfully joined room {}", room.room_id());
    });
}

/// Filters a room message and hands the text ones to `on_message`.
async fn on_room_message<F>(
    event: OriginalSyncRoomMessageEvent,
    room: Room,
    client: Client,
    on_message: &F,
) where
    F: Fn(ReceivedText) + Send + Sync + 'static,
{
    // Ignore messages from non-joined rooms
    if room.state() != RoomState::Joined {
        return;
    }

    // Ignore our own panels and notices
    if client.user_id() == Some(&*event.sender) {
        return;
    }

    // An edited word is not a new move
    if matches!(event.content.relates_to, Some(Relation::Replacement(_))) {
        return;
    }

    // Only handle text messages
    let MessageType::Text(text_content) = event.content.msgtype else {
        return;
    };

    let sender_name = sender_name(&room, &event.sender).await;

    on_message(ReceivedText {
        body: text_content.body,
        room_id: room.room_id().to_string(),
        sender_id: event.sender.to_string(),
        sender_name,
        event_id: event.event_id.to_string(),
    });
}

/// Display name of `sender` in `room`, falling back to the localpart of their id.
async fn sender_name(room: &Room, sender: &UserId) -> String {
    match room.get_member_no_sync(sender).await {
        Ok(Some(member)) => member
            .display_name()
            .unwrap_or_else(|| sender.localpart())
            .to_owned(),
        Ok(None) => sender.localpart().to_owned(),
        Err(e) => {
            warn!("failed to get member {} of {}: {:?}", sender, room.room_id(), e);
            sender.localpart().to_owned()
        }
    }
}

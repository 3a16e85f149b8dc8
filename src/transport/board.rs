//! Dispatch table for interactive controls.
//!
//! A controller that shows a panel registers it for `(channel, family)` and
//! drains the presses from the returned [`PanelRegistration`]. Presses are
//! routed by the identity of the control (its channel and action family), so
//! there is at most one live panel of each family per channel.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wordchain::transport::{ChannelId, ControlBoard, PanelFamily};
//!
//! # async fn example(board: ControlBoard) {
//! let channel = ChannelId::from("!home:example.com");
//! let Some(mut panel) = board.register(&channel, PanelFamily::Poll) else {
//!     return;
//! };
//! while let Some(press) = panel.next(Duration::from_secs(60)).await {
//!     println!("{} pressed {:?}", press.user, press.action);
//! }
//! board.unregister(&panel);
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;
use tokio::sync::mpsc;
use tokio::time;

use crate::transport::{ChannelId, Interaction};

/// Size of the press queue of a panel.
const PANEL_QUEUE_SIZE: usize = 32;

/// Groups of controls sharing a dispatch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelFamily {
    /// Enrollment panel of the word-chain game, shown in the home room
    Enrollment,
    /// Restart / end panel shown in a session channel once a match is over
    PostGame,
    /// Poll panels
    Poll,
}

struct Slot {
    /// Tells a registration apart from a later one of the same key
    id: u64,
    tx: mpsc::Sender<Interaction>,
}

/// Receiving side of a registered panel.
pub struct PanelRegistration {
    channel: ChannelId,
    family: PanelFamily,
    id: u64,
    rx: mpsc::Receiver<Interaction>,
}

impl PanelRegistration {
    /// The channel the panel is shown in.
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Waits for the next press, up to `idle`.
    ///
    /// Returns `None` when the idle timeout fires.
    pub async fn next(&mut self, idle: Duration) -> Option<Interaction> {
        time::timeout(idle, self.rx.recv()).await.ok().flatten()
    }

    /// Waits for the next press without time limit.
    pub async fn recv(&mut self) -> Option<Interaction> {
        self.rx.recv().await
    }

    /// Takes the presses already queued, without waiting.
    pub fn drain(&mut self) -> Vec<Interaction> {
        let mut pending = Vec::new();
        while let Ok(interaction) = self.rx.try_recv() {
            pending.push(interaction);
        }
        pending
    }
}

/// Table of the panels currently accepting presses.
#[derive(Default)]
pub struct ControlBoard {
    panels: DashMap<(ChannelId, PanelFamily), Slot>,
    next_id: AtomicU64,
}

impl ControlBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a panel for `(channel, family)`.
    ///
    /// # Arguments
    ///
    /// * `channel` - The channel the panel is shown in
    /// * `family` - The family of the controls the panel offers
    ///
    /// # Returns
    ///
    /// The receiving side of the panel, or `None` if a panel of the same
    /// family is already registered in the channel.
    pub fn register(&self, channel: &ChannelId, family: PanelFamily) -> Option<PanelRegistration> {
        match self.panels.entry((channel.clone(), family)) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = mpsc::channel(PANEL_QUEUE_SIZE);
                entry.insert(Slot { id, tx });
                debug!("registered {:?} panel {} in {}", family, id, channel);

                Some(PanelRegistration {
                    channel: channel.clone(),
                    family,
                    id,
                    rx,
                })
            }
        }
    }

    /// Removes a panel. Presses queued but not yet drained are dropped.
    pub fn unregister(&self, registration: &PanelRegistration) {
        let key = (registration.channel.clone(), registration.family);
        if self
            .panels
            .remove_if(&key, |_, slot| slot.id == registration.id)
            .is_some()
        {
            debug!(
                "unregistered {:?} panel {} in {}",
                registration.family, registration.id, registration.channel
            );
        }
    }

    /// Whether a panel of `family` is registered in `channel`.
    pub fn is_registered(&self, channel: &ChannelId, family: PanelFamily) -> bool {
        self.panels.contains_key(&(channel.clone(), family))
    }

    /// Routes a press to the panel owning it.
    ///
    /// # Errors
    ///
    /// Gives the interaction back when no panel accepts it, so the caller can
    /// answer the presser.
    pub async fn dispatch(&self, interaction: Interaction) -> Result<(), Interaction> {
        let key = (interaction.channel.clone(), interaction.action.family());
        // The map guard must not live across the send below
        let tx = match self.panels.get(&key) {
            Some(slot) => slot.tx.clone(),
            None => return Err(interaction),
        };

        tx.send(interaction).await.map_err(|error| error.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ControlAction, Player};

    fn press(channel: &str, user: &str, action: ControlAction) -> Interaction {
        Interaction {
            channel: ChannelId::from(channel),
            user: Player::new(user, user),
            action,
            event_id: "$press".to_string(),
        }
    }

    #[test]
    fn test_register_twice_same_family() {
        let board = ControlBoard::new();
        let channel = ChannelId::from("!home");

        let first = board.register(&channel, PanelFamily::Enrollment);
        assert!(first.is_some());
        assert!(board.register(&channel, PanelFamily::Enrollment).is_none());
        // Another family has its own slot
        assert!(board.register(&channel, PanelFamily::PostGame).is_some());
        assert!(board.register(&channel, PanelFamily::Poll).is_some());
    }

    #[test]
    fn test_unregister_frees_the_slot() {
        let board = ControlBoard::new();
        let channel = ChannelId::from("!home");

        let registration = board.register(&channel, PanelFamily::Enrollment).unwrap();
        board.unregister(&registration);

        assert!(!board.is_registered(&channel, PanelFamily::Enrollment));
        assert!(board.register(&channel, PanelFamily::Enrollment).is_some());
    }

    #[test]
    fn test_stale_unregister_keeps_newer_panel() {
        let board = ControlBoard::new();
        let channel = ChannelId::from("!home");

        let old = board.register(&channel, PanelFamily::Enrollment).unwrap();
        board.unregister(&old);
        let _new = board.register(&channel, PanelFamily::Enrollment).unwrap();
        board.unregister(&old);

        assert!(board.is_registered(&channel, PanelFamily::Enrollment));
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_owner() {
        let board = ControlBoard::new();
        let mut registration = board
            .register(&ChannelId::from("!home"), PanelFamily::Enrollment)
            .unwrap();

        board
            .dispatch(press("!home", "@alice", ControlAction::Join))
            .await
            .unwrap();

        let received = registration.next(Duration::from_secs(1)).await.unwrap();
        assert_eq!(received.action, ControlAction::Join);
        assert_eq!(received.user.id.as_str(), "@alice");
    }

    #[tokio::test]
    async fn test_dispatch_without_owner_gives_interaction_back() {
        let board = ControlBoard::new();
        let _poll = board
            .register(&ChannelId::from("!home"), PanelFamily::Poll)
            .unwrap();

        let result = board
            .dispatch(press("!home", "@alice", ControlAction::End))
            .await;

        assert!(matches!(result, Err(i) if i.action == ControlAction::End));
    }

    #[tokio::test]
    async fn test_drain_returns_queued_presses() {
        let board = ControlBoard::new();
        let mut registration = board
            .register(&ChannelId::from("!game"), PanelFamily::Enrollment)
            .unwrap();

        for user in ["@alice", "@bob"] {
            board
                .dispatch(press("!game", user, ControlAction::End))
                .await
                .unwrap();
        }

        let pending = registration.drain();
        assert_eq!(pending.len(), 2);
        assert!(registration.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_times_out() {
        let board = ControlBoard::new();
        let mut registration = board
            .register(&ChannelId::from("!home"), PanelFamily::Enrollment)
            .unwrap();

        assert!(registration.next(Duration::from_secs(180)).await.is_none());
    }
}

//! Matrix protocol integration for the bot.
//!
//! This module provides the Matrix side of the bot:
//! - Login and session persistence
//! - Real-time event synchronization
//! - The [`crate::transport::Transport`] implementation used by the game and
//!   the polls
//!
//! # Architecture
//!
//! The module is structured around the [`client::MatrixClient`] which coordinates:
//! - **Login**: password login or session restoration via the login submodule
//! - **Session**: session file and store location via the session submodule
//! - **Sync**: real-time event handling and room synchronization via the sync submodule
//!
//! # Examples
//!
//! ```no_run
//! use wordchain::matrix::{MatrixClient, UserCredentials};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let credentials = UserCredentials {
//!     user_id: "@wordchain:example.com".to_string(),
//!     password: "password".to_string(),
//!     store_passphrase: None,
//! };
//!
//! let client = MatrixClient::new(&credentials, "./data").await?;
//! client.sync(|text| println!("{}: {}", text.sender_name, text.body)).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod login;
mod session;
mod sync;

pub use crate::matrix::client::MatrixClient;

/// User credentials for a Matrix account
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Password of the matrix account
    pub password: String,
    /// Passphrase of the local sqlite store
    pub store_passphrase: Option<String>,
}

/// A text message received in a joined room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedText {
    pub body: String,
    pub room_id: String,
    pub sender_id: String,
    /// Display name of the sender in the room, or the localpart of their id
    pub sender_name: String,
    pub event_id: String,
}

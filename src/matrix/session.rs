//! Persistence of the Matrix login between runs.
//!
//! The data directory of the bot holds:
//! - `session` - JSON file with the access tokens and the last sync token
//! - `sqlite/` - the sqlite store of the Matrix SDK (room state, members)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, trace};
use matrix_sdk::authentication::matrix::MatrixSession;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Content of the session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    /// Access tokens and device of the bot account.
    user_session: MatrixSession,

    /// The latest sync token, absent right after a login.
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// The session file and store location of the bot.
///
/// Cloned into the sync loop, which records the sync token after every
/// response. Reads always go to the disk, so the clones stay consistent.
///
/// # Examples
///
/// ```no_run
/// use wordchain::matrix::session::SessionStore;
///
/// # async fn example() -> Result<(), anyhow::Error> {
/// let store = SessionStore::open("./wordchain-data/session").await?;
/// if !store.has_session() {
///     println!("first start, a login is needed");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionStore {
    /// The session read at startup, if any.
    stored: Option<StoredSession>,
    /// Path to the sqlite store. Value is `dir_path/sqlite`
    sqlite_path: PathBuf,
    /// Path to the session file. Value is `dir_path/session`
    session_path: PathBuf,
}

impl SessionStore {
    /// Opens the data directory, reading the session file if there is one.
    ///
    /// A missing or unreadable session file means a fresh login.
    ///
    /// # Arguments
    ///
    /// * `dir_path` - Directory holding the session file and the sqlite store.
    ///   It is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(dir_path: impl AsRef<Path>) -> Result<SessionStore> {
        let dir_path = dir_path.as_ref();
        fs::create_dir_all(dir_path)
            .await
            .with_context(|| format!("cannot create data directory {}", dir_path.display()))?;

        let sqlite_path = dir_path.join("sqlite");
        let session_path = dir_path.join("session");

        let stored = match read_session(&session_path).await {
            Ok(stored) => stored,
            Err(e) => {
                debug!("ignoring session file {}: {:?}", session_path.display(), e);
                None
            }
        };
        debug!("found user session: {}", stored.is_some());

        Ok(SessionStore {
            stored,
            sqlite_path,
            session_path,
        })
    }

    /// Whether a session file was found when the store was opened.
    pub fn has_session(&self) -> bool {
        self.stored.is_some()
    }

    /// Path of the sqlite store of the Matrix SDK.
    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// The tokens to restore the login with, if a session was found.
    pub fn user_session(&self) -> Option<&MatrixSession> {
        self.stored.as_ref().map(|s| &s.user_session)
    }

    /// The token to resume the sync from, if one was recorded.
    pub fn sync_token(&self) -> Option<String> {
        self.stored.as_ref().and_then(|s| s.sync_token.clone())
    }

    /// Writes the tokens of a new login, forgetting any previous sync token.
    ///
    /// # Arguments
    ///
    /// * `user_session` - The session returned by the homeserver on login
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub async fn save_user_session(&self, user_session: &MatrixSession) -> Result<()> {
        trace!("persist user session");

        let stored = StoredSession {
            user_session: user_session.clone(),
            sync_token: None,
        };
        fs::write(&self.session_path, serde_json::to_string(&stored)?).await?;
        Ok(())
    }

    /// Records the token to resume the sync from on the next start.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session file to update, or if it
    /// cannot be read or written.
    pub async fn save_sync_token(&self, sync_token: String) -> Result<()> {
        trace!("persist sync token {}", sync_token);

        let mut stored = read_session(&self.session_path)
            .await?
            .context("no session to attach the sync token to")?;
        stored.sync_token = Some(sync_token);
        fs::write(&self.session_path, serde_json::to_string(&stored)?).await?;
        Ok(())
    }
}

/// Reads the session file, `None` if it does not exist.
async fn read_session(session_path: &Path) -> Result<Option<StoredSession>> {
    if !fs::try_exists(session_path).await? {
        return Ok(None);
    }

    let data = fs::read_to_string(session_path).await?;
    Ok(Some(serde_json::from_str(&data)?))
}

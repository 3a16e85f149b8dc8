//! Matrix client creation and login.
//!
//! The first start logs in with the account password and persists the
//! resulting session in the data directory. The next starts restore that
//! session instead of creating a new device.

use anyhow::Context;
use log::{debug, info};
use matrix_sdk::{Client, ruma::OwnedUserId};

use crate::matrix::{UserCredentials, session::SessionStore};

/// Builds a client for the homeserver of `user_id` on the sqlite store.
///
/// # Arguments
///
/// * `user_id` - The bot account, its server name locates the homeserver
/// * `user_credentials` - Holds the optional passphrase of the store
/// * `store` - Gives the location of the sqlite store
async fn build_client(
    user_id: &OwnedUserId,
    user_credentials: &UserCredentials,
    store: &SessionStore,
) -> Result<Client, anyhow::Error> {
    let client = Client::builder()
        .server_name(user_id.server_name())
        .sqlite_store(
            store.sqlite_path(),
            user_credentials.store_passphrase.as_deref(),
        )
        .build()
        .await?;

    debug!("matrix client created");
    Ok(client)
}

/// Logs in with the password and persists the new session.
///
/// # Errors
///
/// Returns an error if the user id is invalid, the login is refused or the
/// session cannot be written.
async fn login(
    user_credentials: &UserCredentials,
    store: &SessionStore,
) -> Result<Client, anyhow::Error> {
    let user_id: OwnedUserId = user_credentials.user_id.clone().try_into()?;
    let client = build_client(&user_id, user_credentials, store).await?;

    client
        .matrix_auth()
        .login_username(&user_id, &user_credentials.password)
        .initial_device_display_name("wordchain bot")
        .send()
        .await?;

    // Persist the user session
    let user_session = client
        .matrix_auth()
        .session()
        .context("no session after login")?;
    store
        .save_user_session(&user_session)
        .await
        .context("error persisting user session")?;

    info!("logged in as {}", user_id);
    Ok(client)
}

/// Restores the session found in the store, without a new login.
async fn restore_session(
    user_credentials: &UserCredentials,
    store: &SessionStore,
) -> Result<Client, anyhow::Error> {
    info!("restoring matrix session from disk");

    let user_id: OwnedUserId = user_credentials.user_id.clone().try_into()?;
    let client = build_client(&user_id, user_credentials, store).await?;

    let user_session = store
        .user_session()
        .context("no stored session to restore")?;
    client.restore_session(user_session.clone()).await?;

    info!("matrix session restored successfully");
    Ok(client)
}

/// Returns a logged in client, restoring the stored session if there is one.
///
/// # Arguments
///
/// * `user_credentials` - Account of the bot and passphrase of the store
/// * `store` - The opened data directory
///
/// # Errors
///
/// Returns an error if the client cannot be built, or if the login or the
/// restoration fails. A restoration failure is not retried with a login:
/// delete the session file to force one.
pub async fn setup_client(
    user_credentials: &UserCredentials,
    store: &SessionStore,
) -> Result<Client, anyhow::Error> {
    info!(
        "setting up matrix client for user {}",
        user_credentials.user_id
    );

    if store.has_session() {
        restore_session(user_credentials, store).await
    } else {
        login(user_credentials, store).await
    }
}

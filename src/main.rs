//! Wordchain - A Matrix bot hosting word-chain games and polls.
//!
//! # Overview
//!
//! Wordchain lets the members of a Matrix room play a turn-based word-chain
//! game: players take turns sending a word that starts with the last letter of
//! the previous word, without reusing a word, within a time limit. The first
//! player who fails loses. Each game runs in a private room created for its
//! players and deleted once they are done.
//!
//! The bot also runs simple polls in any room it has joined.
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! matrix:
//!   user_id: "@wordchain:matrix.org"
//!   password: "your-password"
//!
//! game:
//!   turn_timeout: 30
//! ```
//!
//! Every value can be overridden with a `WORDCHAIN_` environment variable, see
//! [`config`].
//!
//! # Usage
//!
//! ```bash
//! wordchain --config config.yaml --data ./wordchain-data
//! ```
//!
//! # Bot Commands
//!
//! - `!wordchain` - Open the enrollment of a new game in the room
//! - `!wordchain join` / `!wordchain leave` / `!wordchain begin` - Enrollment controls
//! - `!wordchain restart` / `!wordchain end` - Play again or stop after a game
//! - `!wordchain help` - Display help information
//! - `!poll <title>` with one option per line - Create a poll
//! - `!poll open` / `!poll vote <n>` / `!poll close` - Run a poll
//!
//! # Architecture
//!
//! - [`bot`] - Routes the Matrix messages to the game and the polls
//! - [`commands`] - Command parsing and Markdown rendering
//! - [`config`] - YAML configuration loading with environment variable support
//! - [`game`] - Enrollment, turn engine, sessions and post-game choice
//! - [`matrix`] - Matrix client, session persistence and the chat transport
//! - [`poll`] - Polls
//! - [`transport`] - Chat transport abstraction, message waiters and control dispatch

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{bot::Bot, config::Config};

mod bot;
mod commands;
mod config;
mod game;
mod matrix;
mod poll;
mod transport;

/// Command-line arguments for the Wordchain bot.
///
/// # Examples
///
/// ```bash
/// wordchain --config config.yaml --data ./wordchain-data
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    ///
    /// The configuration file contains the Matrix account credentials and the
    /// optional game and poll settings. See the [`config`] module for the
    /// expected format.
    #[arg(short, long)]
    config: String,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain `session/`, the Matrix session data
    /// (authentication tokens and sqlite store). It gives access to the bot
    /// account: restrict its permissions.
    #[arg(short, long)]
    data: String,
}

/// Main entry point for the Wordchain bot.
///
/// 1. **Logging Setup**: `info` level by default, overridden by `RUST_LOG`
/// 2. **Argument Parsing**: command-line arguments with `clap`
/// 3. **Configuration Loading**: YAML file, environment overrides and checks
/// 4. **Bot Initialization**: Matrix login or session restoration
/// 5. **Bot Execution**: Matrix sync loop, each message handled in its own task
///
/// Configuration and initialization errors are logged and end the process.
#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting wordchain {}...", env!("CARGO_PKG_VERSION"));

    // Parse command line arguments
    let args = Args::parse();

    // Load configuration from YAML file with environment variable overrides
    let config: Config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return;
        }
    };

    // Launch bot
    let bot = match Bot::new(config, args).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to initialize bot: {:?}", e);
            return;
        }
    };
    bot.start().await;
}

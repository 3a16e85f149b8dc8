//! Configuration file structures for the wordchain bot.
//!
//! The configuration is a YAML file with one mandatory section for the Matrix
//! account and two optional sections tuning the game and the polls.
//!
//! # Configuration File Format
//!
//! ```yaml
//! matrix:
//!   # Fully qualified Matrix user ID for the bot account
//!   user_id: "@wordchain:matrix.org"
//!   # Matrix account password
//!   password: "secret-password"
//!   # Optional passphrase of the local sqlite store
//!   store_passphrase: "store-passphrase"
//!
//! game:
//!   # Seconds without any press before an enrollment is abandoned
//!   enrollment_timeout: 180
//!   # Seconds given to a player to send a word
//!   turn_timeout: 30
//!   # Seconds without any press before a finished session is closed
//!   post_game_timeout: 180
//!   min_players: 2
//!   # Name of the rooms created for the matches
//!   channel_name: "word-chain"
//!
//! poll:
//!   min_options: 2
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every value can be overridden with a `WORDCHAIN_` variable, nested keys
//! being separated by `__`:
//!
//! ```bash
//! export WORDCHAIN_MATRIX__PASSWORD="secret-from-env"
//! export WORDCHAIN_GAME__TURN_TIMEOUT=45
//! ```

use anyhow::{Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

/// Prefix of the environment variables overriding the file.
const ENV_PREFIX: &str = "WORDCHAIN_";

/// Root configuration structure of the bot.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Matrix account configuration
    pub matrix: Matrix,
    /// Word-chain game configuration
    #[serde(default)]
    pub game: GameConfig,
    /// Poll configuration
    #[serde(default)]
    pub poll: PollConfig,
}

/// Matrix account configuration.
#[derive(Debug, Deserialize)]
pub struct Matrix {
    /// Fully qualified Matrix user ID.
    ///
    /// The Matrix ID of the bot account in the format `@username:homeserver.com`.
    pub user_id: String,

    /// Matrix account password.
    ///
    /// Used for the first login only. The session is then persisted in the
    /// data directory and restored on the next starts.
    pub password: String,

    /// Passphrase encrypting the local sqlite store, if any.
    #[serde(default)]
    pub store_passphrase: Option<String>,
}

/// Word-chain game configuration. Durations are in seconds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    pub enrollment_timeout: u64,
    pub turn_timeout: u64,
    pub post_game_timeout: u64,
    pub min_players: usize,
    pub channel_name: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            enrollment_timeout: 180,
            turn_timeout: 30,
            post_game_timeout: 180,
            min_players: 2,
            channel_name: "word-chain".to_owned(),
        }
    }
}

/// Poll configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    /// Minimum number of options of a poll
    pub min_options: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig { min_options: 2 }
    }
}

impl Config {
    /// Loads the configuration from a YAML file, then applies the
    /// `WORDCHAIN_` environment overrides, then checks it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value is
    /// out of range (see [`Config::verify`]).
    pub fn load(path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.verify()?;
        Ok(config)
    }

    /// Checks the values the bot cannot run with.
    pub fn verify(&self) -> Result<()> {
        if self.matrix.user_id.trim().is_empty() {
            bail!("matrix.user_id must not be empty");
        }
        if self.game.min_players < 2 {
            bail!("game.min_players must be at least 2");
        }
        if self.game.enrollment_timeout == 0
            || self.game.turn_timeout == 0
            || self.game.post_game_timeout == 0
        {
            bail!("game timeouts must be greater than 0");
        }
        if self.poll.min_options < 2 {
            bail!("poll.min_options must be at least 2");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    const MINIMAL: &str = r#"
matrix:
  user_id: "@wordchain:example.com"
  password: "secret"
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", MINIMAL)?;

            let config = Config::load("config.yaml").map_err(|e| e.to_string())?;

            assert_eq!(config.matrix.user_id, "@wordchain:example.com");
            assert_eq!(config.matrix.store_passphrase, None);
            assert_eq!(config.game, GameConfig::default());
            assert_eq!(config.poll, PollConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_full_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
matrix:
  user_id: "@wordchain:example.com"
  password: "secret"
  store_passphrase: "store"
game:
  turn_timeout: 45
  min_players: 3
  channel_name: "chain"
poll:
  min_options: 3
"#,
            )?;

            let config = Config::load("config.yaml").map_err(|e| e.to_string())?;

            assert_eq!(config.matrix.store_passphrase.as_deref(), Some("store"));
            assert_eq!(config.game.turn_timeout, 45);
            assert_eq!(config.game.enrollment_timeout, 180);
            assert_eq!(config.game.min_players, 3);
            assert_eq!(config.game.channel_name, "chain");
            assert_eq!(config.poll.min_options, 3);
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", MINIMAL)?;
            jail.set_env("WORDCHAIN_MATRIX__PASSWORD", "from-env");
            jail.set_env("WORDCHAIN_GAME__TURN_TIMEOUT", "10");

            let config = Config::load("config.yaml").map_err(|e| e.to_string())?;

            assert_eq!(config.matrix.password, "from-env");
            assert_eq!(config.game.turn_timeout, 10);
            Ok(())
        });
    }

    #[test]
    fn test_missing_matrix_section() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "game:\n  turn_timeout: 10\n")?;
            assert!(Config::load("config.yaml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_verify_rejects_bad_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                &format!("{}game:\n  min_players: 1\n", MINIMAL),
            )?;
            let error = Config::load("config.yaml").unwrap_err();
            assert!(error.to_string().contains("min_players"));

            jail.create_file(
                "config.yaml",
                &format!("{}game:\n  turn_timeout: 0\n", MINIMAL),
            )?;
            assert!(Config::load("config.yaml").is_err());
            Ok(())
        });
    }
}

//! Bot module wiring the Matrix client to the word-chain game and the polls.
//!
//! This module provides the main [`Bot`] implementation. It orchestrates the
//! bot lifecycle: the Matrix sync loop receives every text message, and each
//! message is handled in its own task.
//!
//! # Message Processing Flow
//!
//! ```text
//! Matrix Message → Commander::parse
//!     ├── not a command ────────► WordChain::on_message (a move of a running turn)
//!     ├── invalid command ──────► reply with the usage
//!     ├── !wordchain start ─────► WordChain::start (runs the whole game in this task)
//!     ├── !poll <title> ────────► Polls::run (runs the whole poll in this task)
//!     ├── !wordchain help ──────► reply with the help
//!     └── control command ──────► Interaction → WordChain / Polls
//! ```
//!
//! The game and the polls share one [`ControlBoard`]: a control command is
//! routed to the panel of its family registered in the room it was typed in.

use log::{debug, error};
use std::{path::Path, sync::Arc};

use crate::{
    Args,
    commands::{Command, CommandParseError, Commander, format_help},
    config::Config,
    game::{GameSettings, WordChain, engine::RandomOrder},
    matrix::{MatrixClient, ReceivedText, UserCredentials},
    poll::{PollSettings, Polls},
    transport::{
        ChannelId, ControlBoard, GuildId, IncomingMessage, Interaction, NoticeTarget, PanelFamily,
        Player, Transport,
    },
};

/// Everything the task handling one message needs.
struct MessageContext {
    /// The received message
    text: ReceivedText,
    matrix_client: Arc<MatrixClient>,
    commander: Arc<Commander>,
    word_chain: Arc<WordChain>,
    polls: Arc<Polls>,
}

impl MessageContext {
    /// The room of the message.
    fn channel(&self) -> ChannelId {
        ChannelId::from(self.text.room_id.as_str())
    }

    fn author(&self) -> Player {
        Player::new(self.text.sender_id.as_str(), self.text.sender_name.as_str())
    }

    fn notice_target(&self) -> NoticeTarget {
        NoticeTarget {
            channel: self.channel(),
            user: self.author().id,
            event_id: Some(self.text.event_id.clone()),
        }
    }

    /// Answers the message to its sender only. Failures are logged.
    async fn reply(&self, body: &str) {
        if let Err(e) = self
            .matrix_client
            .send_ephemeral(&self.notice_target(), body)
            .await
        {
            error!("failed to reply in {}: {:?}", self.text.room_id, e);
        }
    }
}

/// Main bot structure.
///
/// # Fields
///
/// * `matrix_client` - Matrix connection, also the chat transport
/// * `commander` - Parser of the `!wordchain` and `!poll` commands
/// * `word_chain` - Word-chain game controller
/// * `polls` - Poll controller
pub struct Bot {
    matrix_client: Arc<MatrixClient>,

    commander: Arc<Commander>,

    word_chain: Arc<WordChain>,

    polls: Arc<Polls>,
}

impl Bot {
    /// Connects to Matrix and builds the game and poll controllers.
    ///
    /// # Arguments
    ///
    /// * `config` - Account and game settings
    /// * `args` - Command-line arguments, for the data directory
    ///
    /// # Errors
    ///
    /// Returns an error if the Matrix login or session restoration fails.
    pub async fn new(config: Config, args: Args) -> Result<Self, anyhow::Error> {
        let data_path = Path::new(&args.data).join("session");

        // Create matrix client
        let matrix_client = Arc::new(
            MatrixClient::new(
                &UserCredentials {
                    user_id: config.matrix.user_id,
                    password: config.matrix.password,
                    store_passphrase: config.matrix.store_passphrase,
                },
                &data_path.to_string_lossy(),
            )
            .await?,
        );

        let transport: Arc<dyn Transport> = matrix_client.clone();
        let board = Arc::new(ControlBoard::new());

        let word_chain = Arc::new(WordChain::new(
            Arc::clone(&transport),
            Arc::clone(&board),
            Arc::new(RandomOrder),
            GameSettings::from(&config.game),
        ));
        let polls = Arc::new(Polls::new(
            transport,
            board,
            PollSettings::from(&config.poll),
        ));

        Ok(Bot {
            matrix_client,
            commander: Arc::new(Commander::new()),
            word_chain,
            polls,
        })
    }

    /// Runs the Matrix sync loop until it fails.
    pub async fn start(self) {
        let matrix_client = Arc::clone(&self.matrix_client);
        let commander = Arc::clone(&self.commander);
        let word_chain = Arc::clone(&self.word_chain);
        let polls = Arc::clone(&self.polls);

        // Create message handler closure
        let on_message = move |text: ReceivedText| {
            let ctx = MessageContext {
                text,
                matrix_client: Arc::clone(&matrix_client),
                commander: Arc::clone(&commander),
                word_chain: Arc::clone(&word_chain),
                polls: Arc::clone(&polls),
            };
            Self::handle_matrix_message(ctx)
        };

        // Start matrix sync
        if let Err(e) = self.matrix_client.sync(on_message).await {
            error!("matrix sync failed: {:?}", e);
        }
    }

    fn handle_matrix_message(ctx: MessageContext) {
        tokio::spawn(async move {
            // Parse body to extract command
            let command = match ctx.commander.parse(&ctx.text.body) {
                Ok(command) => command,
                Err(e) => match e {
                    // Not a command: it may be the word of a running turn
                    CommandParseError::NotForBot => {
                        let message = IncomingMessage {
                            channel: ctx.channel(),
                            author: ctx.author(),
                            body: ctx.text.body.clone(),
                            event_id: ctx.text.event_id.clone(),
                        };
                        if ctx.word_chain.on_message(message) {
                            debug!("move received in {}", ctx.text.room_id);
                        }
                        return;
                    }
                    // Send error message if the command is invalid
                    CommandParseError::InvalidCommand(message) => {
                        ctx.reply(&message).await;
                        return;
                    }
                },
            };

            Self::handle_command(&ctx, command).await;
        });
    }

    async fn handle_command(ctx: &MessageContext, command: Command) {
        let channel = ctx.channel();
        let author = ctx.author();

        match command {
            Command::Help => ctx.reply(&format_help()).await,
            Command::Start => {
                // The room where the game is asked is its home room
                let guild = GuildId::from(ctx.text.room_id.as_str());
                if let Err(e) = ctx.word_chain.start(&guild, &channel, &author).await {
                    ctx.word_chain
                        .report(&channel, &author, &ctx.text.event_id, e)
                        .await;
                }
            }
            Command::PollCreate { title, options } => {
                if let Err(e) = ctx.polls.run(&channel, &author, &title, options).await {
                    ctx.polls.report(&ctx.notice_target(), e).await;
                }
            }
            other => {
                let Some(action) = other.control_action() else {
                    return;
                };
                let interaction = Interaction {
                    channel,
                    user: author,
                    action,
                    event_id: ctx.text.event_id.clone(),
                };

                match action.family() {
                    PanelFamily::Enrollment | PanelFamily::PostGame => {
                        ctx.word_chain.on_interaction(interaction).await
                    }
                    PanelFamily::Poll => ctx.polls.on_interaction(interaction).await,
                }
            }
        }
    }
}

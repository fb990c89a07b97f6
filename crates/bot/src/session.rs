use async_trait::async_trait;
use tag_core::{Registry, Response, StoreError, parse};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    LoggingIn,
    Connected,
    Disconnecting,
    Failed,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid token provided")]
    InvalidCredential,

    #[error("HTTP request operation failed, status code: {status}")]
    Http { status: u16 },

    #[error("Cannot reach Discord gateway, possible Discord API outage: {0}")]
    GatewayUnreachable(String),

    #[error("The websocket connection has been terminated: {0}")]
    ConnectionClosed(String),

    #[error("Loading commands failed: {0}")]
    Storage(#[from] StoreError),

    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
}

/// The bot's own account, as reported at login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotIdentity {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// The platform connection the session drives.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Authenticates and returns the bot's identity.
    async fn login(&self) -> Result<BotIdentity, SessionError>;
    /// Runs the event connection until it ends.
    async fn connect(&self) -> Result<(), SessionError>;
    /// Asks a running `connect` to return.
    async fn disconnect(&self);
}

/// A platform message reduced to what the session looks at.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// `None` for direct messages.
    pub guild_id: Option<u64>,
    pub author_id: u64,
    pub author_is_bot: bool,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// A stored tag, credited to its owner.
    Owner(u64),
    Builtin(&'static str),
}

/// Content fields of an outgoing reply; the platform adapter renders them.
#[derive(Debug, Clone)]
pub struct Reply {
    pub body: String,
    pub author_label: String,
    pub author_icon: Option<String>,
    pub attribution: Attribution,
    pub sent_at: OffsetDateTime,
}

impl Reply {
    fn new(response: Response, identity: &BotIdentity) -> Self {
        let (body, attribution) = match response {
            Response::Tag(tag) => (tag.reply, Attribution::Owner(tag.owner)),
            Response::Text { builtin, body } => (body, Attribution::Builtin(builtin)),
        };
        Self {
            body,
            author_label: capitalize(&identity.name),
            author_icon: identity.avatar_url.clone(),
            attribution,
            sent_at: OffsetDateTime::now_utc(),
        }
    }
}

/// First character upper-cased, the rest lower-cased.
#[must_use]
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// The only guild whose messages are answered.
    pub guild_id: u64,
    pub prefix: String,
}

/// Lifecycle and message dispatch for one bot connection.
///
/// The registry lock is only taken for synchronous work, never across a
/// network call, so commands from concurrent events run one after another.
#[derive(Debug)]
pub struct Session {
    settings: SessionSettings,
    registry: Mutex<Registry>,
    identity: RwLock<BotIdentity>,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(registry: Registry, settings: SessionSettings) -> Self {
        Self {
            settings,
            registry: Mutex::new(registry),
            identity: RwLock::new(BotIdentity::default()),
            state: watch::Sender::new(SessionState::Disconnected),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolves once the session reaches `wanted`.
    pub async fn wait_for_state(&self, wanted: SessionState) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == wanted).await;
    }

    /// Runs `f` with exclusive access to the registry.
    pub async fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        f(&mut *self.registry.lock().await)
    }

    fn transition(
        &self,
        action: &'static str,
        from: &[SessionState],
        to: SessionState,
    ) -> Result<SessionState, SessionError> {
        let mut current = SessionState::Disconnected;
        let moved = self.state.send_if_modified(|s| {
            current = *s;
            if from.contains(s) {
                *s = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(from = ?current, to = ?to, "Session state changed");
            Ok(current)
        } else {
            Err(SessionError::InvalidState {
                action,
                state: current,
            })
        }
    }

    fn fail(&self, err: SessionError) -> SessionError {
        let _ = self.transition(
            "fail",
            &[
                SessionState::LoggingIn,
                SessionState::Connected,
                SessionState::Disconnecting,
            ],
            SessionState::Failed,
        );
        error!(error = %err, "Session failed");
        err
    }

    async fn flush(&self) {
        info!("Saving commands...");
        match self.registry.lock().await.flush() {
            Ok(()) => info!("Saved"),
            Err(e) => warn!(error = %e, "Saving commands failed"),
        }
    }

    /// Logs in, loads the registry, then serves messages until the connection
    /// ends or [`Session::stop`] is called.
    ///
    /// # Errors
    ///
    /// Login and connection failures, and an unreadable store, leave the
    /// session `Failed` and are returned. Calling `start` on a session that is
    /// not `Disconnected` returns [`SessionError::InvalidState`].
    pub async fn start(&self, gateway: &dyn Gateway) -> Result<(), SessionError> {
        self.transition("start", &[SessionState::Disconnected], SessionState::LoggingIn)?;

        info!("Logging in...");
        let login = gateway.login().await;
        if self.state() == SessionState::Disconnecting {
            return self.abandon_login();
        }
        let identity = login.map_err(|e| self.fail(e))?;
        info!(user = %identity.name, "Logged in");
        *self.identity.write().await = identity;

        info!("Loading commands...");
        {
            let mut registry = self.registry.lock().await;
            let count = registry
                .load()
                .map_err(|e| self.fail(SessionError::Storage(e)))?;
            info!(count, commands = ?registry.list_commands(), "Loaded commands");
        }

        if self
            .transition("connect", &[SessionState::LoggingIn], SessionState::Connected)
            .is_err()
        {
            return self.abandon_login();
        }
        info!("Connecting...");
        let outcome = gateway.connect().await;

        match self.state() {
            SessionState::Disconnecting | SessionState::Disconnected => {
                if let Err(e) = outcome {
                    debug!(error = %e, "Connection ended with an error during shutdown");
                }
                self.wait_for_state(SessionState::Disconnected).await;
                Ok(())
            }
            SessionState::Connected => match outcome {
                Ok(()) => {
                    info!("Connection closed");
                    self.flush().await;
                    self.transition("close", &[SessionState::Connected], SessionState::Disconnected)?;
                    Ok(())
                }
                Err(e) => {
                    let err = self.fail(e);
                    self.flush().await;
                    Err(err)
                }
            },
            state @ (SessionState::LoggingIn | SessionState::Failed) => {
                Err(SessionError::InvalidState {
                    action: "finish",
                    state,
                })
            }
        }
    }

    /// Finishes a `start` that was stopped before it connected. Nothing was
    /// changed yet, so the store is left as it is.
    fn abandon_login(&self) -> Result<(), SessionError> {
        self.transition(
            "abandon",
            &[SessionState::Disconnecting],
            SessionState::Disconnected,
        )?;
        info!("Stopped before connecting");
        Ok(())
    }

    /// Disconnects and saves. While logging in, this only marks the session
    /// so that `start` returns instead of connecting. Does nothing otherwise.
    pub async fn stop(&self, gateway: &dyn Gateway) {
        let Ok(previous) = self.transition(
            "stop",
            &[SessionState::LoggingIn, SessionState::Connected],
            SessionState::Disconnecting,
        ) else {
            debug!(state = ?self.state(), "Stop requested while not connected");
            return;
        };
        if previous == SessionState::LoggingIn {
            info!("Stop requested during login; not connecting");
            return;
        }
        gateway.disconnect().await;
        self.flush().await;
        let _ = self.transition(
            "stop",
            &[SessionState::Disconnecting],
            SessionState::Disconnected,
        );
        info!("Disconnected");
    }

    /// Returns the reply for `msg`, or `None` when it should be ignored:
    /// not connected, outside the configured guild, sent by a bot, not a
    /// command, or an unknown command.
    pub async fn handle_message(&self, msg: &InboundMessage) -> Option<Reply> {
        if self.state() != SessionState::Connected
            || msg.guild_id != Some(self.settings.guild_id)
            || msg.author_is_bot
        {
            return None;
        }
        let parsed = parse(&self.settings.prefix, &msg.content)?;
        debug!(command = parsed.command, author = msg.author_id, "Parsed command");

        let response = self
            .registry
            .lock()
            .await
            .dispatch(msg.author_id, parsed.command, parsed.argument)?;
        let identity = self.identity.read().await;
        Some(Reply::new(response, &identity))
    }
}

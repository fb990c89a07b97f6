use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::{
    all::{
        Client, Colour, Context, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter,
        CreateMessage, EventHandler, GatewayIntents, GuildId, Http, Message, Ready,
        ShardManager, Timestamp, UserId,
    },
    gateway::GatewayError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::session::{Attribution, BotIdentity, Gateway, InboundMessage, Reply, Session, SessionError};

/// serenity-backed [`Gateway`]. Messages are forwarded to the session and the
/// replies it returns are posted back as embeds.
pub struct DiscordGateway {
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
    client: Mutex<Client>,
}

impl core::fmt::Debug for DiscordGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiscordGateway").finish_non_exhaustive()
    }
}

impl DiscordGateway {
    /// Builds the client; nothing is sent to Discord until [`Gateway::login`].
    pub async fn new(token: &str, session: Arc<Session>, colour: u32) -> Result<Self> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;
        let client = Client::builder(token, intents)
            .event_handler(Handler { session, colour })
            .await
            .context("building discord client")?;
        Ok(Self {
            http: Arc::clone(&client.http),
            shard_manager: Arc::clone(&client.shard_manager),
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn login(&self) -> Result<BotIdentity, SessionError> {
        let user = self.http.get_current_user().await.map_err(classify)?;
        Ok(BotIdentity {
            name: user.name.clone(),
            avatar_url: Some(user.face()),
        })
    }

    async fn connect(&self) -> Result<(), SessionError> {
        self.client.lock().await.start().await.map_err(classify)
    }

    async fn disconnect(&self) {
        self.shard_manager.shutdown_all().await;
    }
}

/// Maps serenity's errors onto the failures the session reports.
#[allow(
    clippy::wildcard_enum_match_arm,
    reason = "serenity::Error is non_exhaustive; anything else ends the connection"
)]
pub fn classify(err: serenity::Error) -> SessionError {
    match &err {
        serenity::Error::Gateway(GatewayError::InvalidAuthentication | GatewayError::NoAuthentication) => {
            SessionError::InvalidCredential
        }
        serenity::Error::Gateway(GatewayError::BuildingUrl | GatewayError::ReconnectFailure)
        | serenity::Error::Tungstenite(_) => SessionError::GatewayUnreachable(err.to_string()),
        serenity::Error::Http(http) => match http.status_code().map(|s| s.as_u16()) {
            Some(401) => SessionError::InvalidCredential,
            Some(status) => SessionError::Http { status },
            None => SessionError::GatewayUnreachable(err.to_string()),
        },
        _ => SessionError::ConnectionClosed(err.to_string()),
    }
}

struct Handler {
    session: Arc<Session>,
    colour: u32,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let inbound = InboundMessage {
            guild_id: msg.guild_id.map(GuildId::get),
            author_id: msg.author.id.get(),
            author_is_bot: msg.author.bot,
            content: msg.content.clone(),
        };
        let Some(reply) = self.session.handle_message(&inbound).await else {
            return;
        };
        let footer = footer_text(&ctx, &reply.attribution).await;
        let embed = render_embed(&reply, self.colour, footer);
        if let Err(e) = msg
            .channel_id
            .send_message(&ctx.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!(error = %e, channel = %msg.channel_id, "Failed to send reply");
        }
    }
}

async fn footer_text(ctx: &Context, attribution: &Attribution) -> String {
    match attribution {
        Attribution::Owner(owner) => format!("{}'s tag", owner_name(ctx, *owner).await),
        Attribution::Builtin(id) => format!("built-in: {id}"),
    }
}

async fn owner_name(ctx: &Context, owner: u64) -> String {
    if owner == 0 {
        return owner.to_string();
    }
    match UserId::new(owner).to_user(ctx).await {
        Ok(user) => user.global_name.unwrap_or(user.name),
        Err(e) => {
            debug!(error = %e, owner, "Owner lookup failed");
            owner.to_string()
        }
    }
}

fn render_embed(reply: &Reply, colour: u32, footer: String) -> CreateEmbed {
    let mut author = CreateEmbedAuthor::new(&reply.author_label);
    if let Some(icon) = &reply.author_icon {
        author = author.icon_url(icon);
    }
    let timestamp = Timestamp::from_unix_timestamp(reply.sent_at.unix_timestamp())
        .unwrap_or_else(|_| Timestamp::now());
    CreateEmbed::new()
        .colour(Colour::new(colour))
        .description(&reply.body)
        .author(author)
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(timestamp)
}

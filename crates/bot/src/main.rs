mod builtins;
mod config;
mod discord;
mod logging;
mod session;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use tag_core::JsonStore;
use tracing::{info, warn};

use crate::{
    config::load_config,
    discord::DiscordGateway,
    logging::init_tracing,
    session::{Session, SessionSettings},
};

#[derive(Parser, Debug)]
#[command(
    name = "tagbot",
    version,
    about = "Discord bot that answers commands with user-created tags"
)]
struct Args {
    /// Bot token. Never written to disk.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,

    /// Path to the YAML config (guild, super-owner, prefix, built-ins)
    #[arg(long, env = "TAGBOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Directory holding commands.json and aliases.json
    #[arg(long, env = "TAGBOT_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so both clap and the log filter see it.
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let registry = builtins::build_registry(&config, Box::new(JsonStore::new(&args.data_dir)));
    info!(
        guild_id = config.guild_id,
        prefix = %config.prefix,
        builtins = ?registry.builtin_names(),
        data_dir = %args.data_dir.display(),
        "Configured"
    );

    let session = Arc::new(Session::new(
        registry,
        SessionSettings {
            guild_id: config.guild_id,
            prefix: config.prefix.clone(),
        },
    ));
    let gateway = Arc::new(
        DiscordGateway::new(&args.token, Arc::clone(&session), config.colour).await?,
    );

    {
        let session = Arc::clone(&session);
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            let mut interrupted = false;
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Cannot listen for Ctrl+C");
                    return;
                }
                if interrupted {
                    warn!("Interrupted again, exiting without saving");
                    std::process::exit(130);
                }
                interrupted = true;
                info!("Interrupted, disconnecting. Press Ctrl+C again to force exit.");
                let session = Arc::clone(&session);
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move { session.stop(gateway.as_ref()).await });
            }
        });
    }

    info!("Starting… Press Ctrl+C to stop.");
    session
        .start(gateway.as_ref())
        .await
        .context("bot session ended")
}

use std::{fs, path::Path};

use anyhow::{Context as _, Result, anyhow, ensure};
use serde::Deserialize;
use tag_core::BuiltinSpec;

/// Embed accent colour used when the config does not set one.
pub const DEFAULT_COLOUR: u32 = 0x98_5F_35;

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// The single guild the bot answers in.
    pub guild_id: u64,
    /// User allowed to edit any tag.
    #[serde(default)]
    pub super_owner: Option<u64>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_colour")]
    pub colour: u32,
    #[serde(default)]
    pub builtins: Option<Vec<BuiltinSpec>>,
}

fn default_prefix() -> String {
    "f".to_owned()
}

const fn default_colour() -> u32 {
    DEFAULT_COLOUR
}

pub fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "config file not found at {}. Create one or set --config",
            path.display()
        ));
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    parse_config(&yaml)
}

fn parse_config(yaml: &str) -> Result<BotConfig> {
    let cfg: BotConfig = serde_yaml::from_str(yaml).context("parsing YAML config")?;
    ensure!(
        !cfg.prefix.is_empty() && !cfg.prefix.contains(|c: char| c == '/' || c.is_whitespace()),
        "prefix {:?} must be non-empty without '/' or whitespace",
        cfg.prefix
    );
    ensure!(cfg.colour <= 0xFF_FF_FF, "colour {:#x} is not a 24-bit RGB value", cfg.colour);
    Ok(cfg)
}

use adapter::{DispatchConfig, DEFAULT_ADMIN_CHANNEL, DEFAULT_MAX_ATTACHMENT_BYTES};
use config::ConfigError;
use domain::{protocol::MESSAGE_SIZE_LIMIT, CommandSyntax};
use serde::Deserialize;
use std::collections::HashMap;

const APP_PREFIX: &str = "NEWTON_";

pub const TOKEN_ENV_VAR: &str = "DISCORD_BOT_TOKEN";
pub const ADMIN_CHANNEL_ENV_VAR: &str = "DISCORD_ADMIN_CHANNEL";

// 兼容旧版本的环境变量名
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    (TOKEN_ENV_VAR, "discord.token"),
    (ADMIN_CHANNEL_ENV_VAR, "bot.admin_channel"),
    ("DISCORD_LOG_CHANNEL", "bot.log_channel"),
];

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default)]
    pub discord: DiscordSettings,
    pub database: DatabaseSettings,
    pub bot: BotSettings,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct DiscordSettings {
    pub token: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BotSettings {
    pub admin_channel: String,
    /// Where the flair subsystem posts its audit lines.
    pub log_channel: String,
    pub summoning_key: String,
    pub command_prefix: String,
    pub message_size_limit: usize,
    pub max_attachment_bytes: u64,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        Self::build(&run_mode, collect_env_vars(std::env::vars()))
    }

    fn build(run_mode: &str, env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let env_json =
            serde_json::to_string(&env_map).map_err(|e| ConfigError::Foreign(Box::new(e)))?;

        let s = config::Config::builder()
            .set_default("database.url", "sqlite://data/newton.db")?
            .set_default("bot.admin_channel", DEFAULT_ADMIN_CHANNEL)?
            .set_default("bot.log_channel", "newtons-log")?
            .set_default("bot.summoning_key", "~")?
            .set_default("bot.command_prefix", "!")?
            .set_default("bot.message_size_limit", MESSAGE_SIZE_LIMIT as i64)?
            .set_default("bot.max_attachment_bytes", DEFAULT_MAX_ATTACHMENT_BYTES as i64)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(&env_json, config::FileFormat::Json))
            .build()?;

        s.try_deserialize()
    }

    /// The bot can't do anything without a token; callers treat this as fatal.
    pub fn require_token(&self) -> anyhow::Result<&str> {
        match self.discord.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => anyhow::bail!(
                "{0} not found in environment. Try running again with the prefix '{0}=<insert discord bot token here>'",
                TOKEN_ENV_VAR
            ),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bot.summoning_key.trim().is_empty() {
            anyhow::bail!("bot.summoning_key must not be empty");
        }
        if self.bot.command_prefix.trim().is_empty() {
            anyhow::bail!("bot.command_prefix must not be empty");
        }
        if self.bot.message_size_limit == 0 || self.bot.message_size_limit > MESSAGE_SIZE_LIMIT {
            anyhow::bail!(
                "bot.message_size_limit must be between 1 and {}, got {}",
                MESSAGE_SIZE_LIMIT,
                self.bot.message_size_limit
            );
        }
        if self.bot.max_attachment_bytes == 0 {
            anyhow::bail!("bot.max_attachment_bytes must be positive");
        }
        Ok(())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            admin_channel: self.bot.admin_channel.clone(),
            syntax: CommandSyntax::new(&self.bot.summoning_key, &self.bot.command_prefix),
            message_size_limit: self.bot.message_size_limit,
            max_attachment_bytes: self.bot.max_attachment_bytes,
        }
    }
}

fn collect_env_vars(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    let vars: Vec<(String, String)> = vars.collect();
    let mut map = HashMap::new();

    for (legacy, key) in LEGACY_ENV_KEYS {
        if let Some((_, v)) = vars.iter().find(|(k, _)| k == legacy) {
            map.insert(key.to_string(), v.clone());
        }
    }

    // NEWTON_ 前缀优先于旧变量名
    for (k, v) in vars {
        if let Some(rest) = k.strip_prefix(APP_PREFIX) {
            map.insert(rest.replace("__", ".").to_lowercase(), v);
        }
    }
    map
}

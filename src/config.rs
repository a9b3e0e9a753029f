//! Bot configuration module
//!
//! Handles loading configuration from environment variables (and an optional
//! `.env` file). A missing token is fatal: the process refuses to start.

use crate::error::BotError;
use std::env;
use twilight_gateway::Intents;

/// Default port for the preview/health HTTP server
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Bot configuration
#[derive(Clone)]
pub struct BotConfig {
    /// Discord bot token, without the `Bot ` prefix
    pub discord_token: String,

    /// Preview/health/metrics HTTP port
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("http_port", &self.http_port)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BotError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // A blank BOT_TOKEN (e.g. copied from .env.example) must not hide DISCORD_TOKEN
        let raw_token = lookup("BOT_TOKEN")
            .filter(|value| !value.trim().is_empty())
            .or_else(|| lookup("DISCORD_TOKEN"))
            .ok_or_else(|| BotError::Config("BOT_TOKEN or DISCORD_TOKEN must be set".to_string()))?;

        let token = raw_token.trim_start();
        let discord_token = token.strip_prefix("Bot ").unwrap_or(token).trim().to_string();
        if discord_token.is_empty() {
            return Err(BotError::Config("BOT_TOKEN must not be empty".to_string()));
        }

        let http_port = match lookup("HTTP_PORT") {
            Some(value) => value.parse().map_err(|e| {
                BotError::Config(format!("HTTP_PORT must be a valid port number: {e}"))
            })?,
            None => DEFAULT_HTTP_PORT,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            discord_token,
            http_port,
            log_level,
        })
    }

    /// Get configured Discord intents
    ///
    /// Only guild message events are subscribed. MESSAGE_CONTENT does not add
    /// any event type; it is needed for message text to be populated.
    pub fn intents() -> Intents {
        Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_intents_are_minimal() {
        let intents = BotConfig::intents();

        assert!(intents.contains(Intents::GUILD_MESSAGES));
        assert!(intents.contains(Intents::MESSAGE_CONTENT));

        assert!(!intents.contains(Intents::GUILDS));
        assert!(!intents.contains(Intents::GUILD_MEMBERS));
        assert!(!intents.contains(Intents::DIRECT_MESSAGES));
    }

    #[test]
    fn test_default_values() {
        let config = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "abc")])).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = BotConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_empty_token_is_fatal() {
        // Blank counts as unset
        let err = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "   ")])).unwrap_err();
        assert!(err.to_string().contains("must be set"));

        let err = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "Bot ")])).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_bot_prefix_is_stripped() {
        let config = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "Bot abc.def")])).unwrap();
        assert_eq!(config.discord_token, "abc.def");
    }

    #[test]
    fn test_discord_token_fallback() {
        let config = BotConfig::from_lookup(lookup_from(&[("DISCORD_TOKEN", "xyz")])).unwrap();
        assert_eq!(config.discord_token, "xyz");

        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "primary"),
            ("DISCORD_TOKEN", "fallback"),
        ]))
        .unwrap();
        assert_eq!(config.discord_token, "primary");
    }

    #[test]
    fn test_blank_bot_token_falls_back_to_discord_token() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", ""),
            ("DISCORD_TOKEN", "real-token"),
        ]))
        .unwrap();
        assert_eq!(config.discord_token, "real-token");

        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "  "),
            ("DISCORD_TOKEN", "Bot real-token"),
        ]))
        .unwrap();
        assert_eq!(config.discord_token, "real-token");
    }

    #[test]
    fn test_overrides() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "abc"),
            ("HTTP_PORT", "9000"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.http_port, 9000);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_port() {
        let err = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "abc"),
            ("HTTP_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "secret")])).unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }
}

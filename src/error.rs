//! Domain error types for the Blazium bot
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All application code returns Result<T, BotError>.

use thiserror::Error;

/// Bot domain errors
///
/// Every variant carries structured context fields for diagnostics, so a
/// failure can be matched on without parsing the message string.
///
/// Example log output:
/// ```text
/// BotError::ShardCircuitBroken { shard_id: 3, count: 10, max: 10 }
/// → "shard 3 exceeded consecutive error threshold (10/10)"
/// ```
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),

    /// Fetching the bot's own user from the REST API failed
    #[error("failed to resolve bot identity")]
    Identity(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Creating the recommended set of shards failed
    #[error("shard launch failed")]
    ShardLaunch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Shard reconnection failed (fatal for that shard)
    #[error("shard {shard_id} reconnection failed")]
    ShardReconnectFailed {
        shard_id: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Shard exceeded consecutive error threshold (circuit breaker tripped)
    #[error("shard {shard_id} exceeded consecutive error threshold ({count}/{max})")]
    ShardCircuitBroken { shard_id: u32, count: u32, max: u32 },

    /// Sending a chat reply failed
    #[error("reply to channel {channel_id} failed")]
    ReplyFailed {
        channel_id: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The manager owner task is gone (shut down or panicked)
    #[error("shard manager is not running")]
    ManagerUnavailable,

    /// Installing the Prometheus recorder failed
    #[error("metrics recorder installation failed")]
    MetricsInstall(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BotError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on the `bot_errors_total` counter.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Identity(_) => "identity",
            Self::ShardLaunch(_) => "shard_launch",
            Self::ShardReconnectFailed { .. } => "reconnect_failed",
            Self::ShardCircuitBroken { .. } => "circuit_broken",
            Self::ReplyFailed { .. } => "reply",
            Self::ManagerUnavailable => "manager_unavailable",
            Self::MetricsInstall(_) => "metrics",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_error() -> Box<dyn std::error::Error + Send + Sync> {
        Box::new(std::io::Error::new(std::io::ErrorKind::Other, "test"))
    }

    #[test]
    fn every_variant_has_distinct_error_type_label() {
        let labels = [
            BotError::Config("test".to_string()).error_type_label(),
            BotError::Identity(test_error()).error_type_label(),
            BotError::ShardLaunch(test_error()).error_type_label(),
            BotError::ShardReconnectFailed {
                shard_id: 0,
                source: test_error(),
            }
            .error_type_label(),
            BotError::ShardCircuitBroken { shard_id: 0, count: 10, max: 10 }.error_type_label(),
            BotError::ReplyFailed {
                channel_id: 1,
                source: test_error(),
            }
            .error_type_label(),
            BotError::ManagerUnavailable.error_type_label(),
            BotError::MetricsInstall(test_error()).error_type_label(),
        ];

        let mut unique = labels.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), unique.len(), "Duplicate error_type_label found");
    }

    #[test]
    fn error_messages_contain_context() {
        let err = BotError::ShardCircuitBroken {
            shard_id: 3,
            count: 10,
            max: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("shard 3"), "message should contain shard_id");
        assert!(msg.contains("10/10"), "message should contain count/max");

        let err = BotError::ReplyFailed {
            channel_id: 42,
            source: test_error(),
        };
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn config_error_preserves_message() {
        let err = BotError::Config("BOT_TOKEN must be set".to_string());
        assert_eq!(err.to_string(), "configuration error: BOT_TOKEN must be set");
    }

    #[test]
    fn source_is_preserved() {
        use std::error::Error as _;

        let err = BotError::ShardLaunch(test_error());
        assert_eq!(err.source().map(|s| s.to_string()), Some("test".to_string()));
    }
}

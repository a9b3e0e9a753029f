//! Chat command classification

/// Reply to `ping`
pub const PONG_REPLY: &str = "Pong!";
/// Reply to `pong`
pub const PING_REPLY: &str = "Ping!";
/// Sent before a restart is attempted
pub const RESTART_ACK: &str = "[INFO] Restarting shard manager...";
/// Sent after a successful restart
pub const RESTART_SUCCESS: &str = "[SUCCESS] Manager successfully restarted.";
/// Sent after a failed restart
pub const RESTART_FAILURE: &str =
    "[ERROR] Shard manager restart failed, previous shards are still running.";

/// Commands recognised in chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Pong,
    Restart,
}

impl Command {
    /// Classify message text
    ///
    /// Surrounding whitespace is ignored; the match itself is exact and
    /// case-sensitive, so `PING` is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }

    /// Static label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Restart => "restart",
        }
    }
}

//! Inbound bot events
//!
//! Converts Twilight gateway events into the two variants the dispatcher
//! consumes. Everything else the gateway delivers is dropped here.

use twilight_model::gateway::event::Event;
use twilight_model::id::marker::{ChannelMarker, UserMarker};
use twilight_model::id::Id;

/// A chat message as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author_id: Id<UserMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub content: String,
}

/// Events delivered from shard runners to the dispatch loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// A guild message was created
    MessageReceived(InboundMessage),
    /// A shard finished identifying or resuming
    ShardConnected { shard_id: u32 },
}

impl BotEvent {
    /// Convert a Twilight event received on `shard_id`
    ///
    /// Returns None for events the bot does not handle (e.g., heartbeats)
    pub fn from_gateway(event: &Event, shard_id: u32) -> Option<Self> {
        match event {
            Event::MessageCreate(message) => Some(Self::MessageReceived(InboundMessage {
                author_id: message.author.id,
                channel_id: message.channel_id,
                content: message.content.clone(),
            })),

            Event::Ready(_) | Event::Resumed => Some(Self::ShardConnected { shard_id }),

            // Heartbeats, guild lifecycle and the rest are not forwarded
            _ => None,
        }
    }

    /// Static label used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageReceived(_) => "message_received",
            Self::ShardConnected { .. } => "shard_connected",
        }
    }
}

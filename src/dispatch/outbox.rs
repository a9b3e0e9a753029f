//! Chat reply outbox
//!
//! Replies are queued by the dispatcher and delivered in order by a single
//! worker talking to the Discord REST API.

use crate::error::BotError;
use crate::metrics::BotMetrics;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use twilight_http::Client;
use twilight_model::id::marker::ChannelMarker;
use twilight_model::id::Id;

/// A message to post to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: Id<ChannelMarker>,
    pub content: String,
}

/// Sending half of the reply queue
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Reply>,
}

impl Outbox {
    /// Create an outbox and the receiver its worker drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a reply
    pub fn send(&self, channel_id: Id<ChannelMarker>, content: impl Into<String>) {
        let reply = Reply {
            channel_id,
            content: content.into(),
        };
        if self.tx.send(reply).is_err() {
            warn!(channel_id = %channel_id, "Outbox worker is gone, dropping reply");
        }
    }
}

/// Deliver queued replies until every [`Outbox`] is dropped
pub async fn run_outbox(
    http: Arc<Client>,
    mut replies: mpsc::UnboundedReceiver<Reply>,
    metrics: BotMetrics,
) {
    while let Some(reply) = replies.recv().await {
        if let Err(e) = deliver(&http, &reply).await {
            metrics.record_error(e.error_type_label());
            warn!(channel_id = %reply.channel_id, error = %e, "Failed to send reply");
        }
    }
    debug!("Outbox closed");
}

async fn deliver(http: &Client, reply: &Reply) -> Result<(), BotError> {
    http.create_message(reply.channel_id)
        .content(&reply.content)
        .await
        .map_err(|e| BotError::ReplyFailed {
            channel_id: reply.channel_id.get(),
            source: Box::new(e),
        })?;

    debug!(channel_id = %reply.channel_id, "Reply sent");
    Ok(())
}

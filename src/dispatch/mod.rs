//! Command dispatch
//!
//! A single loop drains the event channel, so events from every shard are
//! handled one at a time and a restart never races another restart.

mod command;
mod outbox;

pub use command::Command;
pub use outbox::{run_outbox, Outbox};

use crate::events::{BotEvent, InboundMessage};
use crate::metrics::BotMetrics;
use crate::shard::ManagerHandle;

use command::{PING_REPLY, PONG_REPLY, RESTART_ACK, RESTART_FAILURE, RESTART_SUCCESS};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use twilight_model::id::marker::UserMarker;
use twilight_model::id::Id;

/// Reacts to bot events
pub struct Dispatcher {
    self_id: Id<UserMarker>,
    manager: ManagerHandle,
    outbox: Outbox,
    metrics: BotMetrics,
}

impl Dispatcher {
    pub fn new(
        self_id: Id<UserMarker>,
        manager: ManagerHandle,
        outbox: Outbox,
        metrics: BotMetrics,
    ) -> Self {
        Self {
            self_id,
            manager,
            outbox,
            metrics,
        }
    }

    /// Handle events until every sender is dropped
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<BotEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Event channel closed, dispatcher stopping");
    }

    /// Single entry point for every event variant
    pub async fn handle(&self, event: BotEvent) {
        match event {
            BotEvent::MessageReceived(message) => self.on_message(message).await,
            BotEvent::ShardConnected { shard_id } => self.on_connect(shard_id),
        }
    }

    fn on_connect(&self, shard_id: u32) {
        self.metrics.record_shard_connected(shard_id);
        info!(shard_id, "Shard connected");
    }

    async fn on_message(&self, message: InboundMessage) {
        // Never answer ourselves
        if message.author_id == self.self_id {
            return;
        }

        let Some(command) = Command::parse(&message.content) else {
            return;
        };

        self.metrics.record_command(command.label());
        debug!(
            command = command.label(),
            channel_id = %message.channel_id,
            author_id = %message.author_id,
            "Dispatching command"
        );

        match command {
            Command::Ping => self.outbox.send(message.channel_id, PONG_REPLY),
            Command::Pong => self.outbox.send(message.channel_id, PING_REPLY),
            Command::Restart => {
                self.outbox.send(message.channel_id, RESTART_ACK);
                info!(channel_id = %message.channel_id, "Restarting shard manager...");

                match self.manager.restart().await {
                    Ok(shards) => {
                        info!(shards, "Manager successfully restarted");
                        self.outbox.send(message.channel_id, RESTART_SUCCESS);
                    }
                    Err(e) => {
                        error!(error = %e, "Error restarting manager");
                        self.outbox.send(message.channel_id, RESTART_FAILURE);
                    }
                }
            }
        }
    }
}

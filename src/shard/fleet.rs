//! Twilight shard fleet
//!
//! Launches the recommended number of shards for the bot and runs one task
//! per shard. Each task narrows gateway events to [`BotEvent`] and pushes
//! them into the single dispatch channel.

use crate::error::BotError;
use crate::events::BotEvent;
use crate::metrics::BotMetrics;
use crate::shard::manager::{Fleet, Launcher};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use twilight_gateway::error::ReceiveMessageErrorType;
use twilight_gateway::{
    CloseFrame, Config, Event, EventTypeFlags, Intents, MessageSender, Shard, StreamExt as _,
};
use twilight_http::Client;

/// Circuit breaker: a shard stops after this many consecutive receive errors
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// How long a closing shard task may take before it is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Launches Twilight shard fleets
pub struct TwilightLauncher {
    http: Arc<Client>,
    token: String,
    intents: Intents,
    events: mpsc::UnboundedSender<BotEvent>,
    metrics: BotMetrics,
}

impl TwilightLauncher {
    pub fn new(
        http: Arc<Client>,
        token: String,
        intents: Intents,
        events: mpsc::UnboundedSender<BotEvent>,
        metrics: BotMetrics,
    ) -> Self {
        Self {
            http,
            token,
            intents,
            events,
            metrics,
        }
    }
}

impl Launcher for TwilightLauncher {
    type Fleet = ShardFleet;

    async fn launch(&self) -> Result<ShardFleet, BotError> {
        let config = Config::new(self.token.clone(), self.intents);
        let shards = twilight_gateway::create_recommended(&self.http, config, |_, builder| {
            builder.build()
        })
        .await
        .map_err(|e| BotError::ShardLaunch(Box::new(e)))?;

        let closing = Arc::new(AtomicBool::new(false));
        let mut senders = Vec::with_capacity(shards.len());
        let mut handles = Vec::with_capacity(shards.len());

        for shard in shards {
            let shard_id = shard.id().number();
            senders.push(shard.sender());

            let events = self.events.clone();
            let closing = Arc::clone(&closing);
            let metrics = self.metrics.clone();

            handles.push(tokio::spawn(async move {
                if let Err(e) = run_shard(shard, events, closing, metrics.clone()).await {
                    metrics.record_error(e.error_type_label());
                    error!(shard_id, error = %e, "Shard task failed");
                }
            }));
        }

        info!(shards = handles.len(), "Shard fleet launched");

        Ok(ShardFleet {
            senders,
            handles,
            closing,
        })
    }
}

/// A launched set of Twilight shards
pub struct ShardFleet {
    senders: Vec<MessageSender>,
    handles: Vec<JoinHandle<()>>,
    closing: Arc<AtomicBool>,
}

impl Fleet for ShardFleet {
    fn shard_count(&self) -> usize {
        self.handles.len()
    }

    async fn close(self) {
        self.closing.store(true, Ordering::SeqCst);

        for sender in &self.senders {
            // Fails only if the shard task already ended
            let _ = sender.close(CloseFrame::NORMAL);
        }

        for mut handle in self.handles {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                warn!("Shard did not close in time, aborting");
                handle.abort();
            }
        }
    }
}

/// What a shard task does with one received item
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Hand the event on to the dispatch channel
    Forward,
    /// Expected close during fleet shutdown
    Stop,
    /// Transient receive error, keep reading
    Retry,
    /// The shard could not re-establish its session
    ReconnectFailed,
    /// Too many receive errors in a row
    CircuitBroken { count: u32 },
}

/// Consecutive-error circuit breaker for one shard
#[derive(Debug, Default)]
struct ReceiveGuard {
    consecutive_errors: u32,
}

impl ReceiveGuard {
    fn on_event(&mut self, event: &Event, closing: bool) -> Step {
        if closing && matches!(event, Event::GatewayClose(_)) {
            return Step::Stop;
        }
        self.consecutive_errors = 0;
        Step::Forward
    }

    fn on_error(&mut self, reconnect: bool) -> Step {
        self.consecutive_errors += 1;

        if reconnect {
            Step::ReconnectFailed
        } else if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            Step::CircuitBroken {
                count: self.consecutive_errors,
            }
        } else {
            Step::Retry
        }
    }
}

/// Run a single shard's event loop
async fn run_shard(
    mut shard: Shard,
    events: mpsc::UnboundedSender<BotEvent>,
    closing: Arc<AtomicBool>,
    metrics: BotMetrics,
) -> Result<(), BotError> {
    let shard_id = shard.id().number();
    info!(shard_id, "Shard starting");

    let mut guard = ReceiveGuard::default();

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => match guard.on_event(&event, closing.load(Ordering::SeqCst)) {
                Step::Stop => break,
                _ => event,
            },
            Err(source) => {
                let reconnect = matches!(source.kind(), ReceiveMessageErrorType::Reconnect);
                warn!(
                    shard_id,
                    error = %source,
                    consecutive = guard.consecutive_errors + 1,
                    "Error receiving event"
                );

                match guard.on_error(reconnect) {
                    Step::ReconnectFailed => {
                        return Err(BotError::ShardReconnectFailed {
                            shard_id,
                            source: Box::new(source),
                        });
                    }
                    Step::CircuitBroken { count } => {
                        return Err(BotError::ShardCircuitBroken {
                            shard_id,
                            count,
                            max: MAX_CONSECUTIVE_ERRORS,
                        });
                    }
                    _ => {
                        metrics.record_error("receive_error");
                        continue;
                    }
                }
            }
        };

        let Some(bot_event) = BotEvent::from_gateway(&event, shard_id) else {
            continue;
        };

        debug!(shard_id, kind = bot_event.kind(), "Forwarding event");
        if events.send(bot_event).is_err() {
            // Dispatch loop is gone; nothing left to deliver to
            info!(shard_id, "Dispatch channel closed, stopping shard");
            break;
        }
    }

    info!(shard_id, "Shard event stream ended");
    Ok(())
}

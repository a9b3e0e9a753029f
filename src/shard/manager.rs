//! Shard manager owner task
//!
//! One task owns the live shard fleet. Everything else talks to it through a
//! [`ManagerHandle`], so the fleet is never touched from two places at once.
//! A restart launches a fresh fleet first and only closes the old one once
//! the new one is up; a failed launch keeps the old fleet running.

use crate::error::BotError;
use crate::metrics::BotMetrics;

use serde::Serialize;
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info};

/// Lifecycle state of the shard manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// Initial launch in progress
    Starting,
    /// Fleet is live
    Running,
    /// A replacement fleet is being launched
    Restarting,
    /// Last launch failed; the previous fleet (if any) is still live
    Degraded,
    /// Fleet closed, owner task exited
    Stopped,
}

impl ManagerState {
    /// Returns true if the bot is serving chat
    pub fn is_ready(&self) -> bool {
        matches!(self, ManagerState::Running)
    }
}

/// Snapshot published on every state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub state: ManagerState,
    pub shards: usize,
}

impl Default for ManagerStatus {
    fn default() -> Self {
        Self {
            state: ManagerState::Starting,
            shards: 0,
        }
    }
}

/// A running set of shards
pub trait Fleet: Send + 'static {
    /// Number of shards in this fleet
    fn shard_count(&self) -> usize;

    /// Close every shard and wait for their tasks to finish
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Creates fleets; called once at start and once per restart
pub trait Launcher: Send + Sync + 'static {
    type Fleet: Fleet;

    fn launch(&self) -> impl Future<Output = Result<Self::Fleet, BotError>> + Send;
}

enum ManagerCommand {
    Restart {
        reply: oneshot::Sender<Result<usize, BotError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the manager owner task
#[derive(Clone)]
pub struct ManagerHandle {
    commands: mpsc::Sender<ManagerCommand>,
    status: watch::Receiver<ManagerStatus>,
}

impl ManagerHandle {
    /// Replace the live fleet with a freshly launched one
    ///
    /// Returns the new shard count. On error the previous fleet keeps running.
    pub async fn restart(&self) -> Result<usize, BotError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ManagerCommand::Restart { reply })
            .await
            .map_err(|_| BotError::ManagerUnavailable)?;
        rx.await.map_err(|_| BotError::ManagerUnavailable)?
    }

    /// Close the live fleet and stop the owner task
    pub async fn shutdown(&self) -> Result<(), BotError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ManagerCommand::Shutdown { reply })
            .await
            .map_err(|_| BotError::ManagerUnavailable)?;
        rx.await.map_err(|_| BotError::ManagerUnavailable)
    }

    /// Current manager status
    pub fn status(&self) -> ManagerStatus {
        *self.status.borrow()
    }
}

/// Owner of the live fleet
pub struct ShardManager<L: Launcher> {
    launcher: L,
    fleet: L::Fleet,
    status: watch::Sender<ManagerStatus>,
    metrics: BotMetrics,
    commands: mpsc::Receiver<ManagerCommand>,
}

impl<L: Launcher> ShardManager<L> {
    /// Launch the first fleet and spawn the owner task
    ///
    /// `status` is shared with the readiness endpoint; it is left `Degraded`
    /// if the first launch fails.
    pub async fn start(
        launcher: L,
        status: watch::Sender<ManagerStatus>,
        metrics: BotMetrics,
    ) -> Result<ManagerHandle, BotError> {
        status.send_replace(ManagerStatus::default());

        let fleet = match launcher.launch().await {
            Ok(fleet) => fleet,
            Err(e) => {
                status.send_replace(ManagerStatus {
                    state: ManagerState::Degraded,
                    shards: 0,
                });
                return Err(e);
            }
        };

        let shards = fleet.shard_count();
        status.send_replace(ManagerStatus {
            state: ManagerState::Running,
            shards,
        });
        metrics.set_shards_running(shards);
        info!(shards, "Shard manager running");

        let (tx, rx) = mpsc::channel(8);
        let handle = ManagerHandle {
            commands: tx,
            status: status.subscribe(),
        };

        let manager = Self {
            launcher,
            fleet,
            status,
            metrics,
            commands: rx,
        };
        tokio::spawn(manager.run());

        Ok(handle)
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                ManagerCommand::Restart { reply } => {
                    let result = self.restart().await;
                    let _ = reply.send(result);
                }
                ManagerCommand::Shutdown { reply } => {
                    self.stop().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }

        // Every handle dropped without an explicit shutdown
        self.stop().await;
    }

    async fn restart(&mut self) -> Result<usize, BotError> {
        let previous = self.fleet.shard_count();
        self.set_state(ManagerState::Restarting, previous);
        info!(shards = previous, "Restarting shard manager");

        match self.launcher.launch().await {
            Ok(fleet) => {
                let shards = fleet.shard_count();
                let old = std::mem::replace(&mut self.fleet, fleet);
                old.close().await;

                self.set_state(ManagerState::Running, shards);
                self.metrics.set_shards_running(shards);
                self.metrics.record_restart(true);
                info!(previous, shards, "Shard manager restarted");
                Ok(shards)
            }
            Err(e) => {
                self.set_state(ManagerState::Degraded, previous);
                self.metrics.record_restart(false);
                self.metrics.record_error(e.error_type_label());
                error!(error = %e, shards = previous, "Restart failed, keeping previous shards");
                Err(e)
            }
        }
    }

    async fn stop(self) {
        info!("Stopping shard manager");
        self.fleet.close().await;
        self.status.send_replace(ManagerStatus {
            state: ManagerState::Stopped,
            shards: 0,
        });
        self.metrics.set_shards_running(0);
        info!("Shard manager stopped");
    }

    fn set_state(&self, state: ManagerState, shards: usize) {
        self.status.send_replace(ManagerStatus { state, shards });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeLauncher;
    use super::*;
    use std::sync::atomic::Ordering;
    use tokio_test::{assert_err, assert_ok};

    async fn start(launcher: &FakeLauncher) -> (ManagerHandle, watch::Receiver<ManagerStatus>) {
        let (status_tx, status_rx) = watch::channel(ManagerStatus::default());
        let handle = ShardManager::start(launcher.clone(), status_tx, BotMetrics::detached())
            .await
            .unwrap();
        (handle, status_rx)
    }

    #[tokio::test]
    async fn test_start_publishes_running() {
        let launcher = FakeLauncher::default();
        let (handle, status) = start(&launcher).await;

        assert_eq!(handle.status().state, ManagerState::Running);
        assert_eq!(status.borrow().shards, 1);
    }

    #[tokio::test]
    async fn test_failed_start_leaves_degraded() {
        let launcher = FakeLauncher::default();
        launcher.fail_next.store(true, Ordering::SeqCst);
        let (status_tx, status_rx) = watch::channel(ManagerStatus::default());

        let result = ShardManager::start(launcher, status_tx, BotMetrics::detached()).await;

        assert!(matches!(result, Err(BotError::ShardLaunch(_))));
        assert_eq!(status_rx.borrow().state, ManagerState::Degraded);
    }

    #[tokio::test]
    async fn test_restart_swaps_fleet_and_closes_old() {
        let launcher = FakeLauncher::default();
        let (handle, _status) = start(&launcher).await;

        let shards = assert_ok!(handle.restart().await);

        assert_eq!(shards, 2);
        assert_eq!(launcher.closed(), vec![1]);
        assert_eq!(handle.status(), ManagerStatus { state: ManagerState::Running, shards: 2 });
    }

    #[tokio::test]
    async fn test_failed_restart_keeps_previous_fleet() {
        let launcher = FakeLauncher::default();
        let (handle, _status) = start(&launcher).await;

        launcher.fail_next.store(true, Ordering::SeqCst);
        assert_err!(handle.restart().await);

        assert!(launcher.closed().is_empty());
        assert_eq!(handle.status(), ManagerStatus { state: ManagerState::Degraded, shards: 1 });

        // An explicit retry recovers
        assert_ok!(handle.restart().await);
        assert_eq!(handle.status().state, ManagerState::Running);
        assert_eq!(launcher.closed(), vec![1]);
    }

    #[tokio::test]
    async fn test_shutdown_closes_fleet_and_stops() {
        let launcher = FakeLauncher::default();
        let (handle, status) = start(&launcher).await;

        assert_ok!(handle.shutdown().await);

        assert_eq!(launcher.closed(), vec![1]);
        assert_eq!(status.borrow().state, ManagerState::Stopped);
        assert!(matches!(handle.restart().await, Err(BotError::ManagerUnavailable)));
    }

    #[test]
    fn test_state_serialization() {
        let status = ManagerStatus {
            state: ManagerState::Degraded,
            shards: 3,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"state":"degraded","shards":3}"#);
    }

    #[test]
    fn test_only_running_is_ready() {
        assert!(ManagerState::Running.is_ready());
        assert!(!ManagerState::Starting.is_ready());
        assert!(!ManagerState::Restarting.is_ready());
        assert!(!ManagerState::Degraded.is_ready());
        assert!(!ManagerState::Stopped.is_ready());
    }
}

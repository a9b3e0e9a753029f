//! Prometheus metrics module
//!
//! Counters are recorded through the global `metrics` facade. The recorder is
//! installed once in `main`; a detached handle renders an empty exposition.

use crate::error::BotError;
use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Bot metrics collector
#[derive(Clone)]
pub struct BotMetrics {
    handle: Arc<PrometheusHandle>,
}

impl BotMetrics {
    /// Install the global Prometheus recorder and return a handle
    pub fn install() -> Result<Self, BotError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| BotError::MetricsInstall(Box::new(e)))?;

        Self::register_metrics();

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Handle backed by a recorder that is not installed globally
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: Arc::new(recorder.handle()),
        }
    }

    /// Register metric descriptions
    fn register_metrics() {
        describe_counter!(
            "bot_commands_total",
            Unit::Count,
            "Chat commands dispatched, by command"
        );
        describe_counter!(
            "bot_shard_connects_total",
            Unit::Count,
            "Shard connect and resume notifications"
        );
        describe_counter!(
            "bot_manager_restarts_total",
            Unit::Count,
            "Shard manager restarts, by outcome"
        );
        describe_counter!("bot_errors_total", Unit::Count, "Total bot errors");
        describe_counter!(
            "bot_link_previews_total",
            Unit::Count,
            "Link-preview documents served to crawlers"
        );
        describe_gauge!(
            "bot_shards_running",
            Unit::Count,
            "Shards in the live fleet"
        );
    }

    /// Record a dispatched chat command
    pub fn record_command(&self, command: &'static str) {
        counter!("bot_commands_total", "command" => command).increment(1);
    }

    /// Record a shard connect
    pub fn record_shard_connected(&self, shard_id: u32) {
        counter!(
            "bot_shard_connects_total",
            "shard_id" => shard_id.to_string()
        )
        .increment(1);
    }

    /// Record a manager restart attempt
    pub fn record_restart(&self, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "failure" };
        counter!("bot_manager_restarts_total", "outcome" => outcome).increment(1);
    }

    /// Record a bot error by its label
    pub fn record_error(&self, error_type: &'static str) {
        counter!("bot_errors_total", "error_type" => error_type).increment(1);
    }

    /// Record a preview served to a link crawler
    pub fn record_link_preview(&self) {
        counter!("bot_link_previews_total").increment(1);
    }

    /// Set the size of the live fleet
    pub fn set_shards_running(&self, count: usize) {
        gauge!("bot_shards_running").set(count as f64);
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Run `f` against a thread-local recorder and return what it rendered
#[cfg(test)]
pub(crate) fn capture(f: impl FnOnce()) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    ::metrics::with_local_recorder(&recorder, f);
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle_renders_without_recorder() {
        let metrics = BotMetrics::detached();
        metrics.record_command("ping");
        metrics.set_shards_running(2);

        // Nothing is installed globally, so the exposition stays empty
        assert!(!metrics.render().contains("bot_commands_total"));
    }

    #[test]
    fn test_command_counter_by_label() {
        let rendered = capture(|| {
            let metrics = BotMetrics::detached();
            metrics.record_command("ping");
            metrics.record_command("ping");
            metrics.record_command("restart");
        });

        assert!(rendered.contains(r#"bot_commands_total{command="ping"} 2"#), "{rendered}");
        assert!(rendered.contains(r#"bot_commands_total{command="restart"} 1"#), "{rendered}");
    }

    #[test]
    fn test_restart_outcomes() {
        let rendered = capture(|| {
            let metrics = BotMetrics::detached();
            metrics.record_restart(true);
            metrics.record_restart(false);
            metrics.record_restart(false);
        });

        assert!(rendered.contains(r#"bot_manager_restarts_total{outcome="success"} 1"#), "{rendered}");
        assert!(rendered.contains(r#"bot_manager_restarts_total{outcome="failure"} 2"#), "{rendered}");
    }

    #[test]
    fn test_shard_and_preview_metrics() {
        let rendered = capture(|| {
            let metrics = BotMetrics::detached();
            metrics.record_shard_connected(3);
            metrics.record_link_preview();
            metrics.record_error("reply");
            metrics.set_shards_running(2);
        });

        assert!(rendered.contains(r#"bot_shard_connects_total{shard_id="3"} 1"#), "{rendered}");
        assert!(rendered.contains("bot_link_previews_total 1"), "{rendered}");
        assert!(rendered.contains(r#"bot_errors_total{error_type="reply"} 1"#), "{rendered}");
        assert!(rendered.contains("bot_shards_running 2"), "{rendered}");
    }
}

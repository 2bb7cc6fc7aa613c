//! The plugin contract and the per-invocation handler context.

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crawlhub_core::{AppError, AppResult};

use crate::descriptor::PluginOptions;
use crate::events::EventEnvelope;
use crate::intent::{WriteIntent, WriteTarget};

/// Trait that all plugins must implement.
///
/// `options()` is queried exactly once at load; the returned contract is
/// immutable for the plugin's lifetime. `on_event` receives a read-only
/// envelope plus a [`HandlerContext`] for write intents and isolated
/// requests. An `Err` or panic from `on_event` is isolated to the plugin
/// for that cycle and never affects other plugins.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Human-readable plugin name.
    fn name(&self) -> &str;

    /// Stable plugin ID, unique among loaded plugins.
    fn id(&self) -> &str;

    /// Declared capability set and execution frequency.
    fn options(&self) -> PluginOptions;

    /// Called once when the plugin is loaded.
    async fn on_load(&self) -> AppResult<()> {
        Ok(())
    }

    /// Called once when the plugin is unloaded.
    async fn on_unload(&self) -> AppResult<()> {
        Ok(())
    }

    /// Handles one event the plugin is eligible for.
    async fn on_event(&self, event: &EventEnvelope, cx: &HandlerContext) -> AppResult<()>;
}

/// Per-invocation context handed to a handler.
///
/// Write intents submitted here are collected behind the dispatch barrier
/// and mediated in plugin-registration order; intents from a handler that
/// faults or times out in the same cycle are discarded.
#[derive(Debug)]
pub struct HandlerContext {
    plugin_id: String,
    isolated_allowed: bool,
    intents: mpsc::UnboundedSender<WriteIntent>,
    isolated: TaskTracker,
}

impl HandlerContext {
    pub(crate) fn new(
        plugin_id: &str,
        isolated_allowed: bool,
        intents: mpsc::UnboundedSender<WriteIntent>,
        isolated: TaskTracker,
    ) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            isolated_allowed,
            intents,
            isolated,
        }
    }

    /// ID of the plugin this context was issued to.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Submits a body-replacing write intent for this cycle.
    ///
    /// Capability enforcement happens at mediation: an intent outside the
    /// plugin's declared set is rejected there and never reaches the live
    /// resource.
    pub fn submit_write(&self, target: WriteTarget, payload: impl Into<Vec<u8>>) -> AppResult<()> {
        self.send(WriteIntent::replace(&self.plugin_id, target, payload))
    }

    /// Submits a body-transforming write intent for this cycle.
    ///
    /// The transform runs over the cumulative body produced by intents
    /// applied earlier in the same cycle.
    pub fn submit_transform<F>(&self, target: WriteTarget, f: F) -> AppResult<()>
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.send(WriteIntent::transform(&self.plugin_id, target, f))
    }

    /// Spawns work onto the isolated-request domain.
    ///
    /// Isolated tasks run decoupled from crawl dispatch and never block it.
    /// Requires the `isolated_requests` capability; results do not re-enter
    /// the dispatch pipeline.
    pub fn spawn_isolated<F>(&self, fut: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.isolated_allowed {
            return Err(AppError::capability_violation(format!(
                "plugin '{}' did not declare isolated_requests",
                self.plugin_id
            )));
        }
        self.isolated.spawn(fut);
        Ok(())
    }

    fn send(&self, intent: WriteIntent) -> AppResult<()> {
        self.intents
            .send(intent)
            .map_err(|_| AppError::internal("dispatch cycle already closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlhub_core::error::ErrorKind;
    use crawlhub_core::types::RequestId;

    fn context(isolated: bool) -> (HandlerContext, mpsc::UnboundedReceiver<WriteIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            HandlerContext::new("test-plugin", isolated, tx, TaskTracker::new()),
            rx,
        )
    }

    #[tokio::test]
    async fn test_submit_write_tags_origin_plugin() {
        let (cx, mut rx) = context(false);
        cx.submit_write(WriteTarget::ResponseBody(RequestId::new("r1")), b"body".to_vec())
            .unwrap();
        let intent = rx.recv().await.unwrap();
        assert_eq!(intent.plugin_id, "test-plugin");
    }

    #[tokio::test]
    async fn test_spawn_isolated_requires_capability() {
        let (cx, _rx) = context(false);
        let err = cx.spawn_isolated(async {}).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapabilityViolation);

        let (cx, _rx) = context(true);
        assert!(cx.spawn_isolated(async {}).is_ok());
    }
}

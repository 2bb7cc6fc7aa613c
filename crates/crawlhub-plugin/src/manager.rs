//! Plugin manager — lifecycle management and the event pump.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crawlhub_core::config::plugin::PluginConfig;
use crawlhub_core::types::PageId;
use crawlhub_core::AppResult;

use crate::dispatcher::{DispatchReport, EventDispatcher};
use crate::events::EventEnvelope;
use crate::mediator::WriteMediator;
use crate::policy::ExecutionPolicy;
use crate::registry::PluginRegistry;
use crate::traits::Plugin;

/// Manages plugin lifecycle and wires the registry, policy engine,
/// dispatcher, and mediator together.
#[derive(Debug)]
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    policy: Arc<ExecutionPolicy>,
    mediator: Arc<WriteMediator>,
    dispatcher: Arc<EventDispatcher>,
    queue_capacity: usize,
    shutdown: CancellationToken,
    /// Aggregated per-plugin fault counts across cycles; the host decides
    /// how to surface them.
    fault_counts: std::sync::Mutex<HashMap<String, u64>>,
    /// Cancellation tokens for pages with in-flight cycles.
    page_tokens: std::sync::Mutex<HashMap<PageId, CancellationToken>>,
}

impl PluginManager {
    /// Creates a new plugin manager from configuration.
    pub fn new(config: &PluginConfig) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        let policy = Arc::new(ExecutionPolicy::new());
        let mediator = Arc::new(WriteMediator::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            registry.clone(),
            policy.clone(),
            mediator.clone(),
            config,
        ));

        Self {
            registry,
            policy,
            mediator,
            dispatcher,
            queue_capacity: config.event_queue_capacity,
            shutdown: CancellationToken::new(),
            fault_counts: std::sync::Mutex::new(HashMap::new()),
            page_tokens: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Loads and registers a plugin.
    ///
    /// Registration errors (`InvalidDescriptor`, `DuplicatePlugin`) are
    /// fatal to that plugin's load, not to the host.
    pub async fn load_plugin(&self, plugin: Arc<dyn Plugin>) -> AppResult<()> {
        plugin.on_load().await?;
        self.registry.register(plugin.clone()).await?;
        info!(plugin_id = %plugin.id(), name = %plugin.name(), "Plugin loaded");
        Ok(())
    }

    /// Unregisters and unloads a plugin.
    pub async fn unload_plugin(&self, plugin_id: &str) -> AppResult<()> {
        let plugin = self.registry.unregister(plugin_id).await?;
        if let Err(e) = plugin.on_unload().await {
            warn!(plugin_id = %plugin_id, error = %e, "Plugin unload returned error");
        }
        info!(plugin_id = %plugin_id, "Plugin unloaded");
        Ok(())
    }

    /// Unloads all plugins.
    pub async fn unload_all(&self) -> AppResult<()> {
        for descriptor in self.registry.list().await {
            if let Err(e) = self.unload_plugin(&descriptor.id).await {
                error!(plugin_id = %descriptor.id, error = %e, "Error unloading plugin");
            }
        }
        info!("All plugins unloaded");
        Ok(())
    }

    /// Dispatches one envelope under its page's cancellation token and
    /// tallies any faults.
    pub async fn dispatch_event(&self, envelope: EventEnvelope) -> DispatchReport {
        let token = self.page_token(envelope.context.page);
        let report = self.dispatcher.dispatch_with_cancel(envelope, &token).await;

        if !report.faults.is_empty() {
            let mut counts = self
                .fault_counts
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            for fault in &report.faults {
                *counts.entry(fault.plugin_id.clone()).or_default() += 1;
            }
        }
        report
    }

    /// Creates the inbound envelope channel sized from configuration.
    pub fn channel(&self) -> (mpsc::Sender<EventEnvelope>, mpsc::Receiver<EventEnvelope>) {
        mpsc::channel(self.queue_capacity)
    }

    /// Event pump: consumes envelopes until the channel closes or the
    /// manager shuts down.
    pub async fn run(&self, mut events: mpsc::Receiver<EventEnvelope>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = events.recv() => match next {
                    Some(envelope) => {
                        let _ = self.dispatch_event(envelope).await;
                    }
                    None => break,
                },
            }
        }
        info!("Event pump stopped");
    }

    /// Cancels in-flight cycles for a page, e.g. on interrupted navigation.
    ///
    /// The page's token stays cancelled, so stragglers dispatched for the
    /// same page after the abort are discarded as well. `end_crawl` drops
    /// the token with the rest of the crawl state.
    pub fn abort_page(&self, page: PageId) {
        warn!(page = %page, "Aborting cycles for page");
        self.page_tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(page)
            .or_default()
            .cancel();
    }

    /// Aggregated per-plugin fault counts.
    pub fn fault_counts(&self) -> HashMap<String, u64> {
        self.fault_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clears crawl-scoped state (frequency dedup, live resources, page
    /// tokens) at crawl end. Loaded plugins stay registered.
    pub async fn end_crawl(&self) {
        self.policy.reset();
        self.mediator.clear().await;
        self.page_tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        info!("Crawl state cleared");
    }

    /// Stops the event pump and waits for isolated-request tasks.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.dispatcher.shutdown().await;
    }

    /// The plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The write mediator.
    pub fn mediator(&self) -> &Arc<WriteMediator> {
        &self.mediator
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    fn page_token(&self, page: PageId) -> CancellationToken {
        self.page_tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(page)
            .or_default()
            .clone()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(&PluginConfig::default())
    }
}

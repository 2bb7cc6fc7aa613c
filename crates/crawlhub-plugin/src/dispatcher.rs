//! Event dispatcher — fans typed envelopes out to eligible plugins.
//!
//! For every envelope, the set of plugins invoked is exactly the
//! registry's capability-eligible set intersected with the policy engine's
//! frequency decision. Handlers run concurrently on spawned tasks under a
//! per-handler timeout; a handler that errors, panics, or times out is
//! isolated and the remaining handlers still observe the event. Dispatch is
//! a barrier: no write intent is applied until every invoked handler has
//! returned, timed out, or been cancelled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crawlhub_core::config::plugin::PluginConfig;
use crawlhub_core::error::ErrorKind;
use crawlhub_core::types::CycleId;
use crawlhub_core::{AppError, AppResult};

use crate::capability::CapabilitySet;
use crate::events::{EventEnvelope, EventKind, EventPayload};
use crate::intent::{WriteIntent, WriteTarget};
use crate::mediator::{OrderedIntent, WriteMediator, WriteReport};
use crate::policy::ExecutionPolicy;
use crate::registry::PluginRegistry;
use crate::traits::HandlerContext;

/// One isolated handler failure within a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PluginFault {
    /// Faulting plugin.
    pub plugin_id: String,
    /// `HandlerFault` or `HandlerTimeout`.
    pub kind: ErrorKind,
    /// Human-readable reason.
    pub message: String,
}

/// Outcome of dispatching one envelope.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Dispatch cycle identity.
    pub cycle: CycleId,
    /// Kind of the dispatched envelope.
    pub kind: EventKind,
    /// Plugins invoked for this envelope, in registration order.
    pub invoked: Vec<String>,
    /// Handler faults isolated during the cycle.
    pub faults: Vec<PluginFault>,
    /// Mediated writes for the cycle.
    pub writes: WriteReport,
    /// Whether the host cancelled the cycle mid-flight.
    pub cancelled: bool,
}

struct Invocation {
    plugin_id: String,
    handle: JoinHandle<AppResult<()>>,
}

/// Fans out envelopes to eligible plugins and routes their write intents
/// through the mediator.
#[derive(Debug)]
pub struct EventDispatcher {
    registry: Arc<PluginRegistry>,
    policy: Arc<ExecutionPolicy>,
    mediator: Arc<WriteMediator>,
    handler_timeout: Duration,
    /// Unbounded-relative-to-crawl domain for plugin-issued requests.
    isolated: TaskTracker,
}

impl EventDispatcher {
    /// Creates a dispatcher over the given registry, policy, and mediator.
    pub fn new(
        registry: Arc<PluginRegistry>,
        policy: Arc<ExecutionPolicy>,
        mediator: Arc<WriteMediator>,
        config: &PluginConfig,
    ) -> Self {
        Self {
            registry,
            policy,
            mediator,
            handler_timeout: Duration::from_secs(config.handler_timeout_seconds),
            isolated: TaskTracker::new(),
        }
    }

    /// Dispatches one envelope to every eligible plugin.
    pub async fn dispatch(&self, envelope: EventEnvelope) -> DispatchReport {
        self.dispatch_with_cancel(envelope, &CancellationToken::new())
            .await
    }

    /// Dispatches one envelope under a host-owned cancellation token.
    ///
    /// If the token fires mid-cycle (e.g. navigation interrupted), in-flight
    /// handlers are aborted and the cycle's write intents are discarded —
    /// never partially applied.
    pub async fn dispatch_with_cancel(
        &self,
        envelope: EventEnvelope,
        cancel: &CancellationToken,
    ) -> DispatchReport {
        let cycle = CycleId::new();
        self.seed_resources(&envelope).await;

        let eligible: Vec<_> = self
            .registry
            .eligible_for(envelope.kind)
            .await
            .into_iter()
            .filter(|r| {
                self.policy.should_fire(
                    &r.descriptor.id,
                    r.descriptor.options.frequency,
                    &envelope.context,
                )
            })
            .collect();

        let mut report = DispatchReport {
            cycle,
            kind: envelope.kind,
            invoked: Vec::new(),
            faults: Vec::new(),
            writes: WriteReport::default(),
            cancelled: false,
        };

        if eligible.is_empty() {
            debug!(cycle = %cycle, kind = %envelope.kind, "No eligible plugins");
            return report;
        }

        debug!(
            cycle = %cycle,
            kind = %envelope.kind,
            eligible = eligible.len(),
            "Dispatching event"
        );

        let envelope = Arc::new(envelope);
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteIntent>();

        let mut invocations = Vec::with_capacity(eligible.len());
        for reg in &eligible {
            let cx = HandlerContext::new(
                &reg.descriptor.id,
                reg.descriptor.options.capabilities.isolated_requests,
                tx.clone(),
                self.isolated.clone(),
            );
            let plugin = reg.plugin.clone();
            let env = Arc::clone(&envelope);
            let budget = self.handler_timeout;
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(budget, plugin.on_event(&env, &cx)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(AppError::with_source(
                        ErrorKind::HandlerFault,
                        format!("handler failed: {e}"),
                        e,
                    )),
                    Err(_) => Err(AppError::handler_timeout(format!(
                        "handler exceeded its {}s budget",
                        budget.as_secs()
                    ))),
                }
            });
            invocations.push(Invocation {
                plugin_id: reg.descriptor.id.clone(),
                handle,
            });
            report.invoked.push(reg.descriptor.id.clone());
        }
        drop(tx);

        // Barrier: every handler returns, times out, or is cancelled before
        // any write intent is applied.
        let mut faulted: HashSet<String> = HashSet::new();
        for invocation in invocations {
            let Invocation {
                plugin_id,
                mut handle,
            } = invocation;

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    handle.abort();
                    report.cancelled = true;
                    (&mut handle).await
                }
                joined = &mut handle => joined,
            };

            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        cycle = %cycle,
                        plugin_id = %plugin_id,
                        kind = %e.kind,
                        "Handler fault: {}",
                        e.message
                    );
                    faulted.insert(plugin_id.clone());
                    report.faults.push(PluginFault {
                        plugin_id,
                        kind: e.kind,
                        message: e.message,
                    });
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(cycle = %cycle, plugin_id = %plugin_id, "Handler panicked");
                    faulted.insert(plugin_id.clone());
                    report.faults.push(PluginFault {
                        plugin_id,
                        kind: ErrorKind::HandlerFault,
                        message: "handler panicked".to_string(),
                    });
                }
                Err(_) => {
                    // Aborted by cancellation; not a plugin fault, but its
                    // intents must not apply.
                    faulted.insert(plugin_id);
                }
            }
        }

        let mut intents = Vec::new();
        while let Ok(intent) = rx.try_recv() {
            intents.push(intent);
        }

        if report.cancelled {
            if !intents.is_empty() {
                warn!(
                    cycle = %cycle,
                    discarded = intents.len(),
                    "Cycle cancelled, write intents discarded"
                );
            }
            return report;
        }

        let contracts: HashMap<&str, (u64, CapabilitySet)> = eligible
            .iter()
            .map(|r| {
                (
                    r.descriptor.id.as_str(),
                    (r.order, r.descriptor.options.capabilities),
                )
            })
            .collect();

        let ordered: Vec<OrderedIntent> = intents
            .into_iter()
            .filter_map(|intent| {
                if faulted.contains(&intent.plugin_id) {
                    warn!(
                        cycle = %cycle,
                        plugin_id = %intent.plugin_id,
                        "Discarding write intent from faulted handler"
                    );
                    return None;
                }
                contracts
                    .get(intent.plugin_id.as_str())
                    .map(|(order, capabilities)| OrderedIntent {
                        intent,
                        order: *order,
                        capabilities: *capabilities,
                    })
            })
            .collect();

        report.writes = self.mediator.apply(cycle, ordered).await;
        report
    }

    /// The write mediator backing this dispatcher.
    pub fn mediator(&self) -> &Arc<WriteMediator> {
        &self.mediator
    }

    /// Waits for all isolated-request tasks to finish. Called at host
    /// shutdown; crawl dispatch never waits on this domain.
    pub async fn shutdown(&self) {
        self.isolated.close();
        self.isolated.wait().await;
    }

    /// Registers live resources carried by mutable envelope payloads so
    /// later write intents have a target to compose against.
    async fn seed_resources(&self, envelope: &EventEnvelope) {
        let Some(request) = &envelope.context.request else {
            return;
        };
        match &envelope.payload {
            EventPayload::Response(response) => {
                self.mediator
                    .register_resource(
                        WriteTarget::ResponseBody(request.clone()),
                        response.body.clone(),
                    )
                    .await;
            }
            EventPayload::Request(req) => {
                self.mediator
                    .register_resource(
                        WriteTarget::RequestBody(request.clone()),
                        req.body.clone().unwrap_or_default(),
                    )
                    .await;
            }
            _ => {}
        }
    }
}

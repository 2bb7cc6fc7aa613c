//! Write mediator — arbitrates concurrent plugin mutations against live
//! resources.
//!
//! Intents for one cycle are applied in plugin-registration order, each
//! seeing the cumulative effect of prior intents in the same cycle. A
//! per-resource lock serializes application across concurrent cycles
//! touching the same resource: one resource, one writer at a time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crawlhub_core::error::ErrorKind;
use crawlhub_core::types::{CycleId, PageId};
use crawlhub_core::{AppError, AppResult};

use crate::capability::CapabilitySet;
use crate::intent::{WriteIntent, WriteOp, WriteTarget};

/// The mediator's view of one mutable live target.
#[derive(Debug, Clone, Default)]
pub struct LiveResource {
    /// Current body, after any applied rewrites.
    pub body: Vec<u8>,
    /// Scripts injected so far (script targets only).
    pub scripts: Vec<String>,
}

/// A write intent annotated with its plugin's registration order and
/// declared capabilities, as collected by the dispatcher for one cycle.
#[derive(Debug, Clone)]
pub struct OrderedIntent {
    /// The intent itself.
    pub intent: WriteIntent,
    /// Registration order of the originating plugin.
    pub order: u64,
    /// Declared capabilities of the originating plugin.
    pub capabilities: CapabilitySet,
}

/// One successfully applied write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedWrite {
    /// Originating plugin.
    pub plugin_id: String,
    /// Mutated target.
    pub target: WriteTarget,
}

/// One rejected write and why it was dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedWrite {
    /// Originating plugin.
    pub plugin_id: String,
    /// Intended target.
    pub target: WriteTarget,
    /// Rejection category (`CapabilityViolation` or `InvalidWrite`).
    pub kind: ErrorKind,
    /// Human-readable reason.
    pub message: String,
}

/// Outcome of mediating one cycle's write intents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteReport {
    /// Writes applied, in application order.
    pub applied: Vec<AppliedWrite>,
    /// Writes dropped without reaching the live resource.
    pub rejected: Vec<RejectedWrite>,
}

/// Arbitrates write intents from multiple plugins against live resources.
#[derive(Debug, Default)]
pub struct WriteMediator {
    resources: RwLock<HashMap<WriteTarget, Arc<Mutex<LiveResource>>>>,
}

impl WriteMediator {
    /// Creates a mediator with no live resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live resource for the given target if none exists yet.
    ///
    /// Called by the dispatcher as envelopes carrying mutable payloads
    /// arrive; an already-registered resource keeps its accumulated edits.
    pub async fn register_resource(&self, target: WriteTarget, body: Vec<u8>) {
        let mut resources = self.resources.write().await;
        resources.entry(target).or_insert_with(|| {
            Arc::new(Mutex::new(LiveResource {
                body,
                scripts: Vec::new(),
            }))
        });
    }

    /// Applies one cycle's intents and returns what was applied or dropped.
    ///
    /// Intents are ordered by plugin registration (submission order breaks
    /// ties), grouped per target, and applied under that target's lock. A
    /// rejected intent never aborts the cycle; remaining intents continue.
    pub async fn apply(&self, cycle: CycleId, mut intents: Vec<OrderedIntent>) -> WriteReport {
        let mut report = WriteReport::default();
        if intents.is_empty() {
            return report;
        }

        intents.sort_by_key(|i| i.order);

        // Group per target, preserving the sorted order within each group.
        let mut groups: Vec<(WriteTarget, Vec<OrderedIntent>)> = Vec::new();
        for item in intents {
            match groups.iter_mut().find(|(t, _)| *t == item.intent.target) {
                Some((_, group)) => group.push(item),
                None => groups.push((item.intent.target.clone(), vec![item])),
            }
        }

        for (target, group) in groups {
            let resource = self.resource_for(&target).await;
            let Some(resource) = resource else {
                for item in group {
                    self.reject(
                        &mut report,
                        item,
                        AppError::invalid_write(format!("no live resource for target {target}")),
                    );
                }
                continue;
            };

            // One resource, one writer at a time across concurrent cycles.
            let mut live = resource.lock().await;
            for item in group {
                if !item.capabilities.permits(&target) {
                    self.reject(
                        &mut report,
                        item,
                        AppError::capability_violation(format!(
                            "write to {target} outside declared capabilities"
                        )),
                    );
                    continue;
                }
                match Self::apply_one(&mut live, &item.intent) {
                    Ok(()) => {
                        debug!(
                            cycle = %cycle,
                            plugin_id = %item.intent.plugin_id,
                            target = %target,
                            "Write applied"
                        );
                        report.applied.push(AppliedWrite {
                            plugin_id: item.intent.plugin_id.clone(),
                            target: target.clone(),
                        });
                    }
                    Err(e) => self.reject(&mut report, item, e),
                }
            }
        }

        report
    }

    /// Current body of a live resource.
    pub async fn body_of(&self, target: &WriteTarget) -> Option<Vec<u8>> {
        let resource = self.resource_for(target).await?;
        let live = resource.lock().await;
        Some(live.body.clone())
    }

    /// Scripts injected into a live page so far.
    pub async fn scripts_of(&self, page: PageId) -> Vec<String> {
        match self.resource_for(&WriteTarget::InjectScript(page)).await {
            Some(resource) => resource.lock().await.scripts.clone(),
            None => Vec::new(),
        }
    }

    /// Removes a live resource, e.g. once the host has flushed it.
    pub async fn remove_resource(&self, target: &WriteTarget) -> Option<LiveResource> {
        let resource = self.resources.write().await.remove(target)?;
        let snapshot = resource.lock().await.clone();
        Some(snapshot)
    }

    /// Drops all live resources. Called at crawl end.
    pub async fn clear(&self) {
        self.resources.write().await.clear();
    }

    async fn resource_for(&self, target: &WriteTarget) -> Option<Arc<Mutex<LiveResource>>> {
        if let Some(resource) = self.resources.read().await.get(target) {
            return Some(resource.clone());
        }
        // Script targets are created on demand; body rewrites require a
        // resource the host registered from a live message.
        if matches!(target, WriteTarget::InjectScript(_)) {
            let mut resources = self.resources.write().await;
            return Some(
                resources
                    .entry(target.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(LiveResource::default())))
                    .clone(),
            );
        }
        None
    }

    fn apply_one(live: &mut LiveResource, intent: &WriteIntent) -> AppResult<()> {
        match (&intent.target, &intent.op) {
            (WriteTarget::InjectScript(_), WriteOp::Replace(bytes)) => {
                let script = std::str::from_utf8(bytes).map_err(|_| {
                    AppError::invalid_write("injected script is not valid UTF-8")
                })?;
                if script.trim().is_empty() {
                    return Err(AppError::invalid_write("injected script is empty"));
                }
                live.scripts.push(script.to_string());
                Ok(())
            }
            (WriteTarget::InjectScript(_), WriteOp::Transform(_)) => Err(AppError::invalid_write(
                "script targets accept injections, not body transforms",
            )),
            (_, WriteOp::Replace(bytes)) => {
                if bytes.is_empty() {
                    return Err(AppError::invalid_write("replacement body is empty"));
                }
                live.body = bytes.clone();
                Ok(())
            }
            (_, WriteOp::Transform(f)) => {
                let next = f(&live.body);
                if next.is_empty() {
                    return Err(AppError::invalid_write("transformed body is empty"));
                }
                live.body = next;
                Ok(())
            }
        }
    }

    fn reject(&self, report: &mut WriteReport, item: OrderedIntent, error: AppError) {
        warn!(
            plugin_id = %item.intent.plugin_id,
            target = %item.intent.target,
            kind = %error.kind,
            "Write intent dropped: {}",
            error.message
        );
        report.rejected.push(RejectedWrite {
            plugin_id: item.intent.plugin_id,
            target: item.intent.target,
            kind: error.kind,
            message: error.message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlhub_core::types::RequestId;

    fn ordered(intent: WriteIntent, order: u64, capabilities: CapabilitySet) -> OrderedIntent {
        OrderedIntent {
            intent,
            order,
            capabilities,
        }
    }

    fn response_target() -> WriteTarget {
        WriteTarget::ResponseBody(RequestId::new("1000.1"))
    }

    #[tokio::test]
    async fn test_intents_compose_in_registration_order() {
        let mediator = WriteMediator::new();
        let target = response_target();
        mediator.register_resource(target.clone(), b"base".to_vec()).await;

        let writer = CapabilitySet::new().with_write_responses();
        // registered p2 first in submission order; registration order must win
        let intents = vec![
            ordered(
                WriteIntent::transform("p2", target.clone(), |b| {
                    let mut out = b.to_vec();
                    out.extend_from_slice(b"+p2");
                    out
                }),
                1,
                writer,
            ),
            ordered(
                WriteIntent::transform("p1", target.clone(), |b| {
                    let mut out = b.to_vec();
                    out.extend_from_slice(b"+p1");
                    out
                }),
                0,
                writer,
            ),
        ];

        let report = mediator.apply(CycleId::new(), intents).await;
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.applied[0].plugin_id, "p1");
        // p2 sees p1's cumulative result, not the original body
        assert_eq!(mediator.body_of(&target).await.unwrap(), b"base+p1+p2".to_vec());
    }

    #[tokio::test]
    async fn test_undeclared_capability_is_rejected_and_resource_untouched() {
        let mediator = WriteMediator::new();
        let target = response_target();
        mediator.register_resource(target.clone(), b"base".to_vec()).await;

        let intents = vec![ordered(
            WriteIntent::replace("p1", target.clone(), b"evil".to_vec()),
            0,
            CapabilitySet::new(), // no write_responses
        )];

        let report = mediator.apply(CycleId::new(), intents).await;
        assert!(report.applied.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, ErrorKind::CapabilityViolation);
        assert_eq!(mediator.body_of(&target).await.unwrap(), b"base".to_vec());
    }

    #[tokio::test]
    async fn test_invalid_write_drops_one_intent_and_continues() {
        let mediator = WriteMediator::new();
        let target = response_target();
        mediator.register_resource(target.clone(), b"base".to_vec()).await;

        let writer = CapabilitySet::new().with_write_responses();
        let intents = vec![
            ordered(WriteIntent::replace("p1", target.clone(), Vec::new()), 0, writer),
            ordered(WriteIntent::replace("p2", target.clone(), b"good".to_vec()), 1, writer),
        ];

        let report = mediator.apply(CycleId::new(), intents).await;
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, ErrorKind::InvalidWrite);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(mediator.body_of(&target).await.unwrap(), b"good".to_vec());
    }

    #[tokio::test]
    async fn test_script_injection_accumulates_per_page() {
        let mediator = WriteMediator::new();
        let page = PageId::new();
        let target = WriteTarget::InjectScript(page);
        let writer = CapabilitySet::new().with_write_js();

        let intents = vec![
            ordered(
                WriteIntent::replace("p1", target.clone(), b"console.log(1)".to_vec()),
                0,
                writer,
            ),
            ordered(
                WriteIntent::replace("p2", target.clone(), b"console.log(2)".to_vec()),
                1,
                writer,
            ),
        ];

        let report = mediator.apply(CycleId::new(), intents).await;
        assert_eq!(report.applied.len(), 2);
        assert_eq!(
            mediator.scripts_of(page).await,
            vec!["console.log(1)".to_string(), "console.log(2)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_script_is_rejected() {
        let mediator = WriteMediator::new();
        let page = PageId::new();
        let target = WriteTarget::InjectScript(page);

        let intents = vec![ordered(
            WriteIntent::replace("p1", target, vec![0xff, 0xfe]),
            0,
            CapabilitySet::new().with_write_js(),
        )];

        let report = mediator.apply(CycleId::new(), intents).await;
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, ErrorKind::InvalidWrite);
        assert!(mediator.scripts_of(page).await.is_empty());
    }

    #[tokio::test]
    async fn test_body_write_without_live_resource_is_rejected() {
        let mediator = WriteMediator::new();
        let intents = vec![ordered(
            WriteIntent::replace("p1", response_target(), b"body".to_vec()),
            0,
            CapabilitySet::new().with_write_responses(),
        )];

        let report = mediator.apply(CycleId::new(), intents).await;
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, ErrorKind::InvalidWrite);
    }
}

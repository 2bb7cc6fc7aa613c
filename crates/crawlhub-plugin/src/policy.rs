//! Execution policy engine — frequency-based deduplication.
//!
//! Tracks, per plugin, the set of context keys already satisfied for
//! frequency classes that deduplicate. Keys are interned to small integers
//! through a shared arena so per-plugin membership checks stay cheap. State
//! grows monotonically over one crawl and is cleared at crawl end.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crawlhub_core::types::{PageId, RequestId};

use crate::descriptor::ExecutionFrequency;
use crate::events::EventContext;

/// Context key a frequency class deduplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ContextKey {
    /// Process-lifetime key for `Once`.
    Global,
    Path(String),
    File(String),
    Page(PageId),
    Request(RequestId),
}

#[derive(Debug, Default)]
struct State {
    /// Interner: context key to arena index.
    keys: HashMap<ContextKey, u32>,
    /// Plugin ID to satisfied arena indices.
    satisfied: HashMap<String, HashSet<u32>>,
}

/// Decides whether a plugin's handler must fire for a given event
/// occurrence.
///
/// The check-and-set is atomic: under concurrent envelopes touching the
/// same context key, exactly one caller observes `true` for a
/// deduplicating frequency.
#[derive(Debug, Default)]
pub struct ExecutionPolicy {
    state: Mutex<State>,
}

impl ExecutionPolicy {
    /// Creates a new policy engine with empty dedup state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `plugin_id` must fire for the event occurrence
    /// described by `context`, updating dedup state when it does.
    ///
    /// `Always` is stateless. `PerRequest` is keyed on the transport
    /// correlation ID, never the URL; an occurrence with no correlation ID
    /// never satisfies it.
    pub fn should_fire(
        &self,
        plugin_id: &str,
        frequency: ExecutionFrequency,
        context: &EventContext,
    ) -> bool {
        let key = match frequency {
            ExecutionFrequency::Always => return true,
            ExecutionFrequency::Once => ContextKey::Global,
            ExecutionFrequency::OncePath => ContextKey::Path(context.path.clone()),
            ExecutionFrequency::OnceFile => ContextKey::File(context.file.clone()),
            ExecutionFrequency::OncePerPage => ContextKey::Page(context.page),
            ExecutionFrequency::PerRequest => match &context.request {
                Some(request) => ContextKey::Request(request.clone()),
                None => return false,
            },
        };
        self.check_and_set(plugin_id, key)
    }

    /// Clears all dedup state. Called at crawl end.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.keys.clear();
        state.satisfied.clear();
    }

    fn check_and_set(&self, plugin_id: &str, key: ContextKey) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let next = state.keys.len() as u32;
        let index = *state.keys.entry(key).or_insert(next);
        state
            .satisfied
            .entry(plugin_id.to_string())
            .or_default()
            .insert(index)
    }
}

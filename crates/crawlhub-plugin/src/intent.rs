//! Write intents — proposed mutations against live crawl resources.
//!
//! An intent is created by a handler during one dispatch cycle and consumed
//! by the write mediator within that same cycle; it is never persisted
//! beyond it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crawlhub_core::types::{PageId, RequestId};

/// The live resource a write intent targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteTarget {
    /// Rewrite the response body of one in-flight request.
    ResponseBody(RequestId),
    /// Rewrite the request body of one in-flight request.
    RequestBody(RequestId),
    /// Inject a script into one live page.
    InjectScript(PageId),
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResponseBody(id) => write!(f, "response_body:{id}"),
            Self::RequestBody(id) => write!(f, "request_body:{id}"),
            Self::InjectScript(id) => write!(f, "inject_script:{id}"),
        }
    }
}

/// Transform applied to the cumulative body of a target resource.
pub type BodyTransform = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// The mutation an intent proposes.
#[derive(Clone)]
pub enum WriteOp {
    /// Replace the target body (or, for script targets, the script text to
    /// inject).
    Replace(Vec<u8>),
    /// Transform the current body. The transform sees the cumulative effect
    /// of intents applied earlier in the same cycle, which lets plugins
    /// compose deterministically instead of racing.
    Transform(BodyTransform),
}

impl fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(bytes) => f.debug_tuple("Replace").field(&bytes.len()).finish(),
            Self::Transform(_) => f.debug_tuple("Transform").field(&"<fn>").finish(),
        }
    }
}

/// A plugin's proposed mutation, tagged with its origin.
#[derive(Debug, Clone)]
pub struct WriteIntent {
    /// ID of the plugin that produced the intent.
    pub plugin_id: String,
    /// Target resource identity.
    pub target: WriteTarget,
    /// Proposed mutation.
    pub op: WriteOp,
}

impl WriteIntent {
    /// Creates a replace intent.
    pub fn replace(plugin_id: &str, target: WriteTarget, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            target,
            op: WriteOp::Replace(payload.into()),
        }
    }

    /// Creates a transform intent.
    pub fn transform<F>(plugin_id: &str, target: WriteTarget, f: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            plugin_id: plugin_id.to_string(),
            target,
            op: WriteOp::Transform(Arc::new(f)),
        }
    }
}

//! Declared plugin capabilities.
//!
//! A fixed set of independent boolean flags, each gating one category of
//! interaction. The dispatcher never invokes a handler for an event category
//! the plugin did not declare, and the mediator never honors a write intent
//! in an undeclared category.

use serde::{Deserialize, Serialize};

use crate::events::EventKind;
use crate::intent::WriteTarget;

/// Capability set declared by a plugin at load time.
///
/// Fixed and validated at registration, never probed per event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Issues its own outbound requests, isolated from the crawl's stream.
    #[serde(default)]
    pub isolated_requests: bool,
    /// Writes/injects into HTTP/WebSocket responses.
    #[serde(default)]
    pub write_responses: bool,
    /// Writes/injects into HTTP/WebSocket requests.
    #[serde(default)]
    pub write_requests: bool,
    /// Injects JS into the page.
    #[serde(default)]
    pub write_js: bool,
    /// Reads HTTP/WebSocket responses.
    #[serde(default)]
    pub listen_responses: bool,
    /// Reads HTTP/WebSocket requests.
    #[serde(default)]
    pub listen_requests: bool,
    /// Listens for local/sessionStorage mutation events.
    #[serde(default)]
    pub listen_storage: bool,
    /// Listens for cookie write events.
    #[serde(default)]
    pub listen_cookies: bool,
    /// Listens for console output.
    #[serde(default)]
    pub listen_console: bool,
    /// Listens for URL changes.
    #[serde(default)]
    pub listen_url: bool,
    /// Listens for generic script events.
    #[serde(default)]
    pub listen_js: bool,
}

impl CapabilitySet {
    /// Creates an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables `isolated_requests`.
    pub fn with_isolated_requests(mut self) -> Self {
        self.isolated_requests = true;
        self
    }

    /// Enables `write_responses`.
    pub fn with_write_responses(mut self) -> Self {
        self.write_responses = true;
        self
    }

    /// Enables `write_requests`.
    pub fn with_write_requests(mut self) -> Self {
        self.write_requests = true;
        self
    }

    /// Enables `write_js`.
    pub fn with_write_js(mut self) -> Self {
        self.write_js = true;
        self
    }

    /// Enables `listen_responses`.
    pub fn with_listen_responses(mut self) -> Self {
        self.listen_responses = true;
        self
    }

    /// Enables `listen_requests`.
    pub fn with_listen_requests(mut self) -> Self {
        self.listen_requests = true;
        self
    }

    /// Enables `listen_storage`.
    pub fn with_listen_storage(mut self) -> Self {
        self.listen_storage = true;
        self
    }

    /// Enables `listen_cookies`.
    pub fn with_listen_cookies(mut self) -> Self {
        self.listen_cookies = true;
        self
    }

    /// Enables `listen_console`.
    pub fn with_listen_console(mut self) -> Self {
        self.listen_console = true;
        self
    }

    /// Enables `listen_url`.
    pub fn with_listen_url(mut self) -> Self {
        self.listen_url = true;
        self
    }

    /// Enables `listen_js`.
    pub fn with_listen_js(mut self) -> Self {
        self.listen_js = true;
        self
    }

    /// Returns whether this set subscribes to the given event kind.
    ///
    /// Kinds that map to no capability flag (e.g. `DocumentRequest`) return
    /// false for every set, so the dispatcher degrades gracefully to event
    /// kinds it does not yet map.
    pub fn listens_to(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::HttpRequest
            | EventKind::InterceptedRequest
            | EventKind::WebSocketRequest => self.listen_requests,
            EventKind::HttpResponse
            | EventKind::InterceptedResponse
            | EventKind::WebSocketResponse => self.listen_responses,
            EventKind::Storage => self.listen_storage,
            EventKind::Cookie => self.listen_cookies,
            EventKind::Console => self.listen_console,
            EventKind::UrlChange => self.listen_url,
            EventKind::JsEvent => self.listen_js,
            _ => false,
        }
    }

    /// Returns whether this set permits a write against the given target.
    pub fn permits(&self, target: &WriteTarget) -> bool {
        match target {
            WriteTarget::ResponseBody(_) => self.write_responses,
            WriteTarget::RequestBody(_) => self.write_requests,
            WriteTarget::InjectScript(_) => self.write_js,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlhub_core::types::{PageId, RequestId};

    #[test]
    fn test_listen_flags_map_to_kinds() {
        let caps = CapabilitySet::new().with_listen_cookies();
        assert!(caps.listens_to(EventKind::Cookie));
        assert!(!caps.listens_to(EventKind::Storage));
        assert!(!caps.listens_to(EventKind::HttpRequest));
    }

    #[test]
    fn test_websocket_shares_http_listen_flags() {
        let caps = CapabilitySet::new().with_listen_requests().with_listen_responses();
        assert!(caps.listens_to(EventKind::WebSocketRequest));
        assert!(caps.listens_to(EventKind::WebSocketResponse));
        assert!(caps.listens_to(EventKind::InterceptedRequest));
        assert!(caps.listens_to(EventKind::InterceptedResponse));
    }

    #[test]
    fn test_unmapped_kind_reaches_nobody() {
        let all = CapabilitySet {
            isolated_requests: true,
            write_responses: true,
            write_requests: true,
            write_js: true,
            listen_responses: true,
            listen_requests: true,
            listen_storage: true,
            listen_cookies: true,
            listen_console: true,
            listen_url: true,
            listen_js: true,
        };
        assert!(!all.listens_to(EventKind::DocumentRequest));
    }

    #[test]
    fn test_write_permissions_by_target() {
        let caps = CapabilitySet::new().with_write_js();
        assert!(caps.permits(&WriteTarget::InjectScript(PageId::new())));
        assert!(!caps.permits(&WriteTarget::ResponseBody(RequestId::new("1"))));
        assert!(!caps.permits(&WriteTarget::RequestBody(RequestId::new("1"))));
    }
}

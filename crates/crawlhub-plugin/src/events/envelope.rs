//! Typed event envelopes delivered to eligible plugins.
//!
//! The host normalizes raw driver signals into one [`EventEnvelope`] per
//! occurrence. Envelopes are shared read-only with handlers; mutations go
//! through write intents and the mediator, never through the envelope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crawlhub_core::types::{PageId, RequestId};

use super::kind::EventKind;

/// Crawl context identity attached to every envelope.
///
/// The `path` is the crawl path/route, `file` the resource/file identity —
/// both used by the execution policy engine for per-path/per-file
/// deduplication. `request` is the transport correlation ID when the signal
/// is tied to one network request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    /// Current page load/navigation.
    pub page: PageId,
    /// Full URL at the time of the signal.
    pub url: String,
    /// Crawl path/route (e.g. `/admin/users`).
    pub path: String,
    /// Resource/file identity (e.g. `app.js`).
    pub file: String,
    /// Transport-level request correlation ID, when applicable.
    pub request: Option<RequestId>,
    /// Timestamp of the signal.
    pub timestamp: DateTime<Utc>,
}

impl EventContext {
    /// Creates a context for the given page and URL.
    pub fn new(page: PageId, url: &str) -> Self {
        Self {
            page,
            url: url.to_string(),
            path: String::new(),
            file: String::new(),
            request: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the crawl path.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Sets the file identity.
    pub fn with_file(mut self, file: &str) -> Self {
        self.file = file.to_string();
        self
    }

    /// Sets the request correlation ID.
    pub fn with_request(mut self, request: RequestId) -> Self {
        self.request = Some(request);
        self
    }
}

/// An HTTP (or intercepted HTTP) request observed by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
}

/// An HTTP (or intercepted HTTP) response observed by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Response status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

/// One WebSocket frame, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketFrame {
    /// Whether the frame carries binary data (text otherwise).
    pub binary: bool,
    /// Frame payload.
    pub payload: Vec<u8>,
}

/// Which storage area a storage event touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageScope {
    /// `window.localStorage`.
    Local,
    /// `window.sessionStorage`.
    Session,
}

/// What the storage event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageAction {
    /// A key was written.
    Write,
    /// A key was removed.
    Remove,
    /// The whole area was cleared.
    Clear,
}

/// A local/sessionStorage mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    /// Storage area.
    pub scope: StorageScope,
    /// Mutation kind.
    pub action: StorageAction,
    /// Affected key (empty for `Clear`).
    pub key: String,
    /// New value (empty for `Remove`/`Clear`).
    pub value: String,
}

/// A cookie write observed by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieEvent {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Cookie domain.
    pub domain: String,
    /// Cookie path.
    pub path: String,
    /// Expiry, if not a session cookie.
    pub expires: Option<DateTime<Utc>>,
    /// `Secure` attribute.
    pub secure: bool,
    /// `HttpOnly` attribute.
    pub http_only: bool,
}

/// One console output line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Console level (`log`, `warn`, `error`, ...).
    pub level: String,
    /// Message text.
    pub text: String,
}

/// A URL change/navigation update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlChange {
    /// Previous URL.
    pub from: String,
    /// New URL.
    pub to: String,
}

/// A generic script event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsEvent {
    /// Event name.
    pub name: String,
    /// Event detail payload.
    pub detail: serde_json::Value,
}

/// Kind-specific payload of an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    /// HTTP request data (plain, intercepted, or document).
    Request(HttpRequest),
    /// HTTP response data (plain or intercepted).
    Response(HttpResponse),
    /// WebSocket frame.
    WebSocket(WebSocketFrame),
    /// Storage mutation.
    Storage(StorageEvent),
    /// Cookie write.
    Cookie(CookieEvent),
    /// Console output.
    Console(ConsoleMessage),
    /// URL change.
    UrlChange(UrlChange),
    /// Generic script event.
    Js(JsEvent),
}

/// Normalized, typed representation of one host signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event kind.
    pub kind: EventKind,
    /// Crawl context identity.
    pub context: EventContext,
    /// Kind-specific payload.
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Top-level document request envelope.
    pub fn document_request(context: EventContext, request: HttpRequest) -> Self {
        Self {
            kind: EventKind::DocumentRequest,
            context,
            payload: EventPayload::Request(request),
        }
    }

    /// HTTP request envelope.
    pub fn http_request(context: EventContext, request: HttpRequest) -> Self {
        Self {
            kind: EventKind::HttpRequest,
            context,
            payload: EventPayload::Request(request),
        }
    }

    /// HTTP response envelope.
    pub fn http_response(context: EventContext, response: HttpResponse) -> Self {
        Self {
            kind: EventKind::HttpResponse,
            context,
            payload: EventPayload::Response(response),
        }
    }

    /// Intercepted (still mutable) HTTP request envelope.
    pub fn intercepted_request(context: EventContext, request: HttpRequest) -> Self {
        Self {
            kind: EventKind::InterceptedRequest,
            context,
            payload: EventPayload::Request(request),
        }
    }

    /// Intercepted (still mutable) HTTP response envelope.
    pub fn intercepted_response(context: EventContext, response: HttpResponse) -> Self {
        Self {
            kind: EventKind::InterceptedResponse,
            context,
            payload: EventPayload::Response(response),
        }
    }

    /// Outbound WebSocket frame envelope.
    pub fn web_socket_request(context: EventContext, frame: WebSocketFrame) -> Self {
        Self {
            kind: EventKind::WebSocketRequest,
            context,
            payload: EventPayload::WebSocket(frame),
        }
    }

    /// Inbound WebSocket frame envelope.
    pub fn web_socket_response(context: EventContext, frame: WebSocketFrame) -> Self {
        Self {
            kind: EventKind::WebSocketResponse,
            context,
            payload: EventPayload::WebSocket(frame),
        }
    }

    /// Storage mutation envelope.
    pub fn storage(context: EventContext, event: StorageEvent) -> Self {
        Self {
            kind: EventKind::Storage,
            context,
            payload: EventPayload::Storage(event),
        }
    }

    /// Cookie write envelope.
    pub fn cookie(context: EventContext, cookie: CookieEvent) -> Self {
        Self {
            kind: EventKind::Cookie,
            context,
            payload: EventPayload::Cookie(cookie),
        }
    }

    /// Console output envelope.
    pub fn console(context: EventContext, message: ConsoleMessage) -> Self {
        Self {
            kind: EventKind::Console,
            context,
            payload: EventPayload::Console(message),
        }
    }

    /// URL change envelope.
    pub fn url_change(context: EventContext, change: UrlChange) -> Self {
        Self {
            kind: EventKind::UrlChange,
            context,
            payload: EventPayload::UrlChange(change),
        }
    }

    /// Generic script event envelope.
    pub fn js_event(context: EventContext, event: JsEvent) -> Self {
        Self {
            kind: EventKind::JsEvent,
            context,
            payload: EventPayload::Js(event),
        }
    }

    /// Request payload accessor.
    pub fn as_request(&self) -> Option<&HttpRequest> {
        match &self.payload {
            EventPayload::Request(r) => Some(r),
            _ => None,
        }
    }

    /// Response payload accessor.
    pub fn as_response(&self) -> Option<&HttpResponse> {
        match &self.payload {
            EventPayload::Response(r) => Some(r),
            _ => None,
        }
    }

    /// Cookie payload accessor.
    pub fn as_cookie(&self) -> Option<&CookieEvent> {
        match &self.payload {
            EventPayload::Cookie(c) => Some(c),
            _ => None,
        }
    }

    /// Storage payload accessor.
    pub fn as_storage(&self) -> Option<&StorageEvent> {
        match &self.payload {
            EventPayload::Storage(s) => Some(s),
            _ => None,
        }
    }

    /// Console payload accessor.
    pub fn as_console(&self) -> Option<&ConsoleMessage> {
        match &self.payload {
            EventPayload::Console(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EventContext {
        EventContext::new(PageId::new(), "https://example.com/a")
            .with_path("/a")
            .with_request(RequestId::new("1000.1"))
    }

    #[test]
    fn test_constructor_sets_matching_kind() {
        let evt = EventEnvelope::cookie(
            ctx(),
            CookieEvent {
                name: "sid".into(),
                value: "abc".into(),
                domain: "example.com".into(),
                path: "/".into(),
                expires: None,
                secure: false,
                http_only: true,
            },
        );
        assert_eq!(evt.kind, EventKind::Cookie);
        assert_eq!(evt.as_cookie().unwrap().name, "sid");
        assert!(evt.as_response().is_none());
    }

    #[test]
    fn test_context_builder_carries_identities() {
        let c = ctx().with_file("app.js");
        assert_eq!(c.path, "/a");
        assert_eq!(c.file, "app.js");
        assert_eq!(c.request.as_ref().unwrap().as_str(), "1000.1");
    }
}

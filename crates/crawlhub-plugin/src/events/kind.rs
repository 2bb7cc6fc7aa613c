//! Enumeration of all event kinds raised by the browser/proxy driver.

use serde::{Deserialize, Serialize};

/// The kind of host signal carried by an [`EventEnvelope`].
///
/// Intercepted kinds are raised while the message is still mutable at the
/// proxy layer; plain request/response kinds are observations after the
/// fact. WebSocket traffic maps to the same listen capabilities as HTTP.
///
/// [`EventEnvelope`]: crate::events::EventEnvelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EventKind {
    /// Top-level document request. Maps to no listen capability; the
    /// dispatcher degrades gracefully and invokes nobody.
    DocumentRequest,
    /// An HTTP request was issued.
    HttpRequest,
    /// An HTTP response was received.
    HttpResponse,
    /// An HTTP request was intercepted at the proxy and is still mutable.
    InterceptedRequest,
    /// An HTTP response was intercepted at the proxy and is still mutable.
    InterceptedResponse,
    /// A WebSocket frame was sent by the page.
    WebSocketRequest,
    /// A WebSocket frame was received by the page.
    WebSocketResponse,
    /// local/sessionStorage was mutated.
    Storage,
    /// A cookie was written.
    Cookie,
    /// Console output was produced.
    Console,
    /// The page URL changed.
    UrlChange,
    /// A generic script event fired.
    JsEvent,
}

impl EventKind {
    /// Returns the string name of this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentRequest => "document_request",
            Self::HttpRequest => "http_request",
            Self::HttpResponse => "http_response",
            Self::InterceptedRequest => "intercepted_request",
            Self::InterceptedResponse => "intercepted_response",
            Self::WebSocketRequest => "web_socket_request",
            Self::WebSocketResponse => "web_socket_response",
            Self::Storage => "storage",
            Self::Cookie => "cookie",
            Self::Console => "console",
            Self::UrlChange => "url_change",
            Self::JsEvent => "js_event",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

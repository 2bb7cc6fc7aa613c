//! Event system — kinds, contexts, and typed envelopes.

pub mod envelope;
pub mod kind;

pub use envelope::{
    ConsoleMessage, CookieEvent, EventContext, EventEnvelope, EventPayload, HttpRequest,
    HttpResponse, JsEvent, StorageAction, StorageEvent, StorageScope, UrlChange, WebSocketFrame,
};
pub use kind::EventKind;

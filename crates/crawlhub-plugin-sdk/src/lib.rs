//! # crawlhub-plugin-sdk
//!
//! SDK for developing plugins for Crawlhub.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crawlhub_plugin_sdk::prelude::*;
//!
//! #[derive(Debug)]
//! struct MyPlugin;
//!
//! #[async_trait]
//! impl Plugin for MyPlugin {
//!     fn name(&self) -> &str {
//!         "My Plugin"
//!     }
//!
//!     fn id(&self) -> &str {
//!         "my-plugin"
//!     }
//!
//!     fn options(&self) -> PluginOptions {
//!         PluginOptions::new(ExecutionFrequency::PerRequest)
//!             .with_capabilities(CapabilitySet::new().with_listen_responses())
//!     }
//!
//!     async fn on_event(&self, event: &EventEnvelope, _cx: &HandlerContext) -> AppResult<()> {
//!         if let Some(response) = event.as_response() {
//!             tracing::info!(status = response.status, "Observed response");
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod builtin;
pub mod closure;

/// Prelude for convenient imports.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use crawlhub_core::{AppError, AppResult};
    pub use crawlhub_plugin::events::{
        ConsoleMessage, CookieEvent, EventContext, EventEnvelope, EventKind, HttpRequest,
        HttpResponse, StorageEvent, UrlChange, WebSocketFrame,
    };
    pub use crawlhub_plugin::{
        CapabilitySet, ExecutionFrequency, HandlerContext, Plugin, PluginManager, PluginOptions,
        WriteTarget,
    };

    pub use crate::builtin::{CookieAuditPlugin, SecurityHeadersPlugin};
    pub use crate::closure::ClosurePlugin;
}

//! Closure-backed plugin for quick prototyping and tests.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crawlhub_core::AppResult;
use crawlhub_plugin::events::EventEnvelope;
use crawlhub_plugin::{HandlerContext, Plugin, PluginOptions};

/// Boxed future returned by a closure handler.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'a>>;

type Handler =
    dyn for<'a> Fn(&'a EventEnvelope, &'a HandlerContext) -> HandlerFuture<'a> + Send + Sync;

/// A [`Plugin`] built from a handler closure, sparing a full trait impl for
/// one-off plugins.
///
/// The handler receives the same envelope and context a trait-based plugin
/// would; lifecycle callbacks keep their defaults.
pub struct ClosurePlugin {
    id: String,
    name: String,
    options: PluginOptions,
    handler: Box<Handler>,
}

impl ClosurePlugin {
    /// Creates a plugin from an ID, display name, options, and handler.
    ///
    /// The handler returns a boxed future, e.g.
    /// `|event, cx| Box::pin(async move { ... })`.
    pub fn new<F>(id: &str, name: &str, options: PluginOptions, handler: F) -> Self
    where
        F: for<'a> Fn(&'a EventEnvelope, &'a HandlerContext) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            options,
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for ClosurePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosurePlugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Plugin for ClosurePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn options(&self) -> PluginOptions {
        self.options
    }

    async fn on_event(&self, event: &EventEnvelope, cx: &HandlerContext) -> AppResult<()> {
        (self.handler)(event, cx).await
    }
}

//! Capability registry — validates and stores plugin contracts at load time.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crawlhub_core::{AppError, AppResult};

use crate::descriptor::PluginDescriptor;
use crate::events::EventKind;
use crate::traits::Plugin;

/// One registered plugin with its immutable descriptor and registration
/// order. The order is the tie-break for conflicting write intents.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Monotonic registration sequence number.
    pub order: u64,
    /// Registration-time contract snapshot.
    pub descriptor: PluginDescriptor,
    /// The plugin instance.
    pub plugin: Arc<dyn Plugin>,
}

#[derive(Debug, Default)]
struct Inner {
    next_order: u64,
    entries: Vec<Registration>,
}

/// Registry of all loaded plugins, in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    inner: RwLock<Inner>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin.
    ///
    /// Fails with `InvalidDescriptor` if the declared contract does not
    /// validate and with `DuplicatePlugin` if the ID is already registered;
    /// re-registering an existing ID always fails.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> AppResult<()> {
        let descriptor = PluginDescriptor::from_plugin(plugin.as_ref());
        descriptor.validate()?;

        let mut inner = self.inner.write().await;
        if inner.entries.iter().any(|e| e.descriptor.id == descriptor.id) {
            return Err(AppError::duplicate_plugin(format!(
                "plugin '{}' is already registered",
                descriptor.id
            )));
        }

        info!(
            plugin_id = %descriptor.id,
            name = %descriptor.name,
            frequency = %descriptor.options.frequency,
            "Registering plugin"
        );

        let order = inner.next_order;
        inner.next_order += 1;
        inner.entries.push(Registration {
            order,
            descriptor,
            plugin,
        });

        Ok(())
    }

    /// Unregisters a plugin by ID and returns it.
    pub async fn unregister(&self, plugin_id: &str) -> AppResult<Arc<dyn Plugin>> {
        let mut inner = self.inner.write().await;
        let pos = inner
            .entries
            .iter()
            .position(|e| e.descriptor.id == plugin_id)
            .ok_or_else(|| AppError::not_found(format!("plugin '{plugin_id}' not found")))?;

        let entry = inner.entries.remove(pos);
        info!(plugin_id = %plugin_id, "Plugin unregistered");
        Ok(entry.plugin)
    }

    /// Returns, in registration order, every plugin whose capability set
    /// includes the flag corresponding to `kind`.
    ///
    /// Kinds with no capability mapping yield the empty set rather than an
    /// error.
    pub async fn eligible_for(&self, kind: EventKind) -> Vec<Registration> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|e| e.descriptor.options.capabilities.listens_to(kind))
            .cloned()
            .collect()
    }

    /// Gets a registration by plugin ID.
    pub async fn get(&self, plugin_id: &str) -> Option<Registration> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .find(|e| e.descriptor.id == plugin_id)
            .cloned()
    }

    /// Lists all registered descriptors in registration order.
    pub async fn list(&self) -> Vec<PluginDescriptor> {
        let inner = self.inner.read().await;
        inner.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Checks whether a plugin is registered.
    pub async fn contains(&self, plugin_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.entries.iter().any(|e| e.descriptor.id == plugin_id)
    }

    /// Returns plugin count.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns whether no plugins are registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlhub_core::error::ErrorKind;

    use crate::capability::CapabilitySet;
    use crate::descriptor::{ExecutionFrequency, PluginOptions};
    use crate::events::EventEnvelope;
    use crate::traits::HandlerContext;

    #[derive(Debug)]
    struct TestPlugin {
        id: String,
        name: String,
        options: PluginOptions,
    }

    #[async_trait::async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn id(&self) -> &str {
            &self.id
        }

        fn options(&self) -> PluginOptions {
            self.options
        }

        async fn on_event(&self, _event: &EventEnvelope, _cx: &HandlerContext) -> crawlhub_core::AppResult<()> {
            Ok(())
        }
    }

    fn plugin(id: &str, caps: CapabilitySet) -> Arc<dyn Plugin> {
        Arc::new(TestPlugin {
            id: id.to_string(),
            name: format!("plugin {id}"),
            options: PluginOptions::new(ExecutionFrequency::Always).with_capabilities(caps),
        })
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let registry = PluginRegistry::new();
        registry
            .register(plugin("p1", CapabilitySet::new()))
            .await
            .unwrap();
        let err = registry
            .register(plugin("p1", CapabilitySet::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicatePlugin);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_invalid_descriptor() {
        let registry = PluginRegistry::new();
        let err = registry
            .register(plugin("", CapabilitySet::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDescriptor);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_eligible_for_preserves_registration_order() {
        let registry = PluginRegistry::new();
        registry
            .register(plugin("b", CapabilitySet::new().with_listen_cookies()))
            .await
            .unwrap();
        registry
            .register(plugin("a", CapabilitySet::new().with_listen_cookies()))
            .await
            .unwrap();
        registry
            .register(plugin("c", CapabilitySet::new().with_listen_storage()))
            .await
            .unwrap();

        let eligible = registry.eligible_for(EventKind::Cookie).await;
        let ids: Vec<&str> = eligible.iter().map(|r| r.descriptor.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(eligible[0].order < eligible[1].order);
    }

    #[tokio::test]
    async fn test_unmapped_kind_yields_empty_set() {
        let registry = PluginRegistry::new();
        registry
            .register(plugin("p1", CapabilitySet::new().with_listen_requests()))
            .await
            .unwrap();
        assert!(registry.eligible_for(EventKind::DocumentRequest).await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_removes_plugin() {
        let registry = PluginRegistry::new();
        registry
            .register(plugin("p1", CapabilitySet::new()))
            .await
            .unwrap();
        registry.unregister("p1").await.unwrap();
        assert!(!registry.contains("p1").await);

        let err = registry.unregister("p1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}

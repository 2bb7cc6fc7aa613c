//! Plugin descriptors — identity, capabilities, and execution frequency.

use serde::{Deserialize, Serialize};

use crawlhub_core::{AppError, AppResult};

use crate::capability::CapabilitySet;
use crate::traits::Plugin;

/// How often/when a plugin's handler fires relative to crawl granularity.
///
/// Exactly one frequency per plugin. All variants except `Always` are
/// deduplicated by the execution policy engine against the matching context
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionFrequency {
    /// Fires exactly once for the plugin's entire lifetime.
    Once,
    /// Fires once per distinct crawl path/route.
    OncePath,
    /// Fires once per distinct resource/file identity.
    OnceFile,
    /// Fires once per page load/navigation.
    OncePerPage,
    /// Fires once per individual request/response pair, keyed on the
    /// transport correlation ID (two requests to the same URL are distinct).
    PerRequest,
    /// Fires on every matching event occurrence, no deduplication.
    Always,
}

impl ExecutionFrequency {
    /// Returns the string name of this frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::OncePath => "once_path",
            Self::OnceFile => "once_file",
            Self::OncePerPage => "once_per_page",
            Self::PerRequest => "per_request",
            Self::Always => "always",
        }
    }
}

impl std::fmt::Display for ExecutionFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options a plugin declares at load time, queried exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOptions {
    /// Declared capability set.
    pub capabilities: CapabilitySet,
    /// Declared execution frequency.
    pub frequency: ExecutionFrequency,
}

impl PluginOptions {
    /// Creates options with the given frequency and no capabilities.
    pub fn new(frequency: ExecutionFrequency) -> Self {
        Self {
            capabilities: CapabilitySet::new(),
            frequency,
        }
    }

    /// Sets the capability set.
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Immutable registration-time snapshot of a plugin's declared contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Stable plugin ID, unique among loaded plugins.
    pub id: String,
    /// Human-readable plugin name.
    pub name: String,
    /// Declared options.
    pub options: PluginOptions,
}

impl PluginDescriptor {
    /// Builds a descriptor by querying the plugin's contract once.
    pub fn from_plugin(plugin: &dyn Plugin) -> Self {
        Self {
            id: plugin.id().to_string(),
            name: plugin.name().to_string(),
            options: plugin.options(),
        }
    }

    /// Validates the descriptor.
    ///
    /// The frequency enum cannot be absent by construction; identity fields
    /// are the remaining failure mode.
    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::invalid_descriptor(format!(
                "plugin '{}' declared an empty ID",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::invalid_descriptor(format!(
                "plugin '{}' declared an empty name",
                self.id
            )));
        }
        Ok(())
    }
}

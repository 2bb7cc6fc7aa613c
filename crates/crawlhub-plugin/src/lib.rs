//! # crawlhub-plugin
//!
//! Plugin host for Crawlhub. Provides:
//!
//! - Plugin lifecycle management (load, unload) with fail-fast descriptor
//!   validation
//! - Capability registry filtering event kinds to declared listeners
//! - Execution policy engine with once/per-path/per-file/per-page/per-request
//!   deduplication
//! - Event dispatcher with concurrent handler invocation, per-handler
//!   timeouts, and fault isolation
//! - Write mediator composing plugin mutations in registration order

pub mod capability;
pub mod descriptor;
pub mod dispatcher;
pub mod events;
pub mod intent;
pub mod manager;
pub mod mediator;
pub mod policy;
pub mod registry;
pub mod traits;

pub use capability::CapabilitySet;
pub use descriptor::{ExecutionFrequency, PluginDescriptor, PluginOptions};
pub use dispatcher::{DispatchReport, EventDispatcher, PluginFault};
pub use events::{EventContext, EventEnvelope, EventKind, EventPayload};
pub use intent::{WriteIntent, WriteOp, WriteTarget};
pub use manager::PluginManager;
pub use mediator::{WriteMediator, WriteReport};
pub use policy::ExecutionPolicy;
pub use registry::PluginRegistry;
pub use traits::{HandlerContext, Plugin};

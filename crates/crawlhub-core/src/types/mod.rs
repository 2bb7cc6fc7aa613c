//! Shared domain types.

pub mod id;

pub use id::{CycleId, PageId, RequestId};

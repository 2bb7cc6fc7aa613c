//! # crawlhub-core
//!
//! Core crate for Crawlhub. Contains configuration schemas, typed
//! identifiers, and the unified error system shared by the plugin host
//! and the plugin SDK.
//!
//! This crate has **no** internal dependencies on other Crawlhub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;

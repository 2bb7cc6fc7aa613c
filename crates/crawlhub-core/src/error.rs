//! Unified application error types for Crawlhub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A plugin descriptor failed validation at registration time.
    InvalidDescriptor,
    /// A plugin with the same ID is already registered.
    DuplicatePlugin,
    /// A write intent was submitted outside the plugin's declared capabilities.
    CapabilityViolation,
    /// A write intent carried a structurally invalid mutation.
    InvalidWrite,
    /// A plugin handler returned an error or panicked during dispatch.
    HandlerFault,
    /// A plugin handler exceeded its time budget for one dispatch cycle.
    HandlerTimeout,
    /// A dispatch cycle was cancelled by the host before completion.
    Cancelled,
    /// The requested resource or plugin was not found.
    NotFound,
    /// A configuration error occurred.
    Configuration,
    /// An internal host error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDescriptor => write!(f, "INVALID_DESCRIPTOR"),
            Self::DuplicatePlugin => write!(f, "DUPLICATE_PLUGIN"),
            Self::CapabilityViolation => write!(f, "CAPABILITY_VIOLATION"),
            Self::InvalidWrite => write!(f, "INVALID_WRITE"),
            Self::HandlerFault => write!(f, "HANDLER_FAULT"),
            Self::HandlerTimeout => write!(f, "HANDLER_TIMEOUT"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout Crawlhub.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire host boundary. Registration errors propagate to whatever
/// loaded the plugin; per-event errors are isolated to the originating
/// plugin and recorded rather than propagated.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-descriptor error.
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDescriptor, message)
    }

    /// Create a duplicate-plugin error.
    pub fn duplicate_plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicatePlugin, message)
    }

    /// Create a capability-violation error.
    pub fn capability_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityViolation, message)
    }

    /// Create an invalid-write error.
    pub fn invalid_write(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidWrite, message)
    }

    /// Create a handler-fault error.
    pub fn handler_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HandlerFault, message)
    }

    /// Create a handler-timeout error.
    pub fn handler_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HandlerTimeout, message)
    }

    /// Create a cancelled error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns whether this error is fatal to a plugin's load.
    ///
    /// Registration-time errors abort loading that one plugin; every other
    /// kind is isolated to a single dispatch cycle.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidDescriptor | ErrorKind::DuplicatePlugin
        )
    }
}

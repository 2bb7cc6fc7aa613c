//! Newtype wrappers for crawl identifiers.
//!
//! Using distinct types prevents accidentally passing a `PageId` where a
//! `RequestId` is expected. Pages and dispatch cycles are identified by
//! host-generated UUIDs; requests are identified by the transport-level
//! correlation ID the browser driver assigns, which is an opaque string —
//! two requests to the same URL carry distinct correlation IDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around `Uuid`.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Return the inner UUID value.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_uuid_id!(
    /// Identifier for one page load/navigation. A reload of the same URL
    /// produces a new `PageId`.
    PageId
);

define_uuid_id!(
    /// Identifier for one dispatch cycle (one envelope fan-out).
    CycleId
);

/// Transport-level request correlation identifier.
///
/// Assigned by the browser/proxy driver per individual network request.
/// This is deliberately not a URL: retried or repeated requests to the
/// same URL are distinct requests with distinct correlation IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a request ID from the driver's correlation string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the correlation string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

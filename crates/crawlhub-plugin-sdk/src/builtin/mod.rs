//! Built-in plugins shipped with the SDK.

pub mod cookies;
pub mod security_headers;

pub use cookies::CookieAuditPlugin;
pub use security_headers::SecurityHeadersPlugin;

//! Cookie audit plugin.
//!
//! Listens for cookie writes across the whole crawl and keeps a deduplicated
//! audit trail, flagging cookies set without `Secure` or `HttpOnly`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crawlhub_core::AppResult;
use crawlhub_plugin::events::EventEnvelope;
use crawlhub_plugin::{
    CapabilitySet, ExecutionFrequency, HandlerContext, Plugin, PluginOptions,
};

/// One audited cookie observation.
#[derive(Debug, Clone, Serialize)]
pub struct CookieRecord {
    /// Cookie name.
    pub name: String,
    /// Cookie domain.
    pub domain: String,
    /// Cookie path.
    pub path: String,
    /// Expiry, if not a session cookie.
    pub expires: Option<DateTime<Utc>>,
    /// `Secure` attribute.
    pub secure: bool,
    /// `HttpOnly` attribute.
    pub http_only: bool,
    /// URL of the page that set the cookie.
    pub set_on: String,
    /// How many times the crawl observed a write for this cookie.
    pub observations: u64,
}

/// Audits cookie writes observed during a crawl.
///
/// Fires on every cookie event and dedups on (name, domain) itself, so
/// repeated writes bump an observation counter instead of a new record.
#[derive(Debug, Default)]
pub struct CookieAuditPlugin {
    records: Mutex<HashMap<(String, String), CookieRecord>>,
}

impl CookieAuditPlugin {
    /// Creates an empty audit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audited cookies.
    pub fn records(&self) -> Vec<CookieRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Plugin for CookieAuditPlugin {
    fn name(&self) -> &str {
        "Cookie Audit"
    }

    fn id(&self) -> &str {
        "cr-p-0001"
    }

    fn options(&self) -> PluginOptions {
        PluginOptions::new(ExecutionFrequency::Always)
            .with_capabilities(CapabilitySet::new().with_listen_cookies())
    }

    async fn on_event(&self, event: &EventEnvelope, _cx: &HandlerContext) -> AppResult<()> {
        let Some(cookie) = event.as_cookie() else {
            return Ok(());
        };

        if !cookie.secure || !cookie.http_only {
            warn!(
                name = %cookie.name,
                domain = %cookie.domain,
                secure = cookie.secure,
                http_only = cookie.http_only,
                "Cookie set without full protection attributes"
            );
        } else {
            debug!(name = %cookie.name, domain = %cookie.domain, "Cookie observed");
        }

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .entry((cookie.name.clone(), cookie.domain.clone()))
            .and_modify(|r| {
                r.observations += 1;
                r.path = cookie.path.clone();
                r.expires = cookie.expires;
                r.secure = cookie.secure;
                r.http_only = cookie.http_only;
            })
            .or_insert_with(|| CookieRecord {
                name: cookie.name.clone(),
                domain: cookie.domain.clone(),
                path: cookie.path.clone(),
                expires: cookie.expires,
                secure: cookie.secure,
                http_only: cookie.http_only,
                set_on: event.context.url.clone(),
                observations: 1,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crawlhub_core::types::PageId;
    use crawlhub_plugin::events::{CookieEvent, EventContext};
    use crawlhub_plugin::PluginManager;

    use super::*;

    fn cookie_envelope(name: &str, secure: bool) -> EventEnvelope {
        EventEnvelope::cookie(
            EventContext::new(PageId::new(), "https://example.com/login"),
            CookieEvent {
                name: name.into(),
                value: "v".into(),
                domain: "example.com".into(),
                path: "/".into(),
                expires: None,
                secure,
                http_only: true,
            },
        )
    }

    #[tokio::test]
    async fn test_audit_dedups_on_name_and_domain() {
        let plugin = Arc::new(CookieAuditPlugin::new());
        let manager = PluginManager::default();
        manager.load_plugin(plugin.clone()).await.unwrap();

        manager.dispatch_event(cookie_envelope("sid", true)).await;
        manager.dispatch_event(cookie_envelope("sid", true)).await;
        manager.dispatch_event(cookie_envelope("theme", false)).await;

        let records = plugin.records();
        assert_eq!(records.len(), 2);
        let sid = records.iter().find(|r| r.name == "sid").unwrap();
        assert_eq!(sid.observations, 2);
    }

    #[tokio::test]
    async fn test_audit_tracks_latest_attributes() {
        let plugin = Arc::new(CookieAuditPlugin::new());
        let manager = PluginManager::default();
        manager.load_plugin(plugin.clone()).await.unwrap();

        manager.dispatch_event(cookie_envelope("sid", true)).await;
        manager.dispatch_event(cookie_envelope("sid", false)).await;

        let records = plugin.records();
        assert!(!records[0].secure);
    }
}

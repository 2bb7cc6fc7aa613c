//! Security header checks for observed responses.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crawlhub_core::types::RequestId;
use crawlhub_core::AppResult;
use crawlhub_plugin::events::EventEnvelope;
use crawlhub_plugin::{
    CapabilitySet, ExecutionFrequency, HandlerContext, Plugin, PluginOptions,
};

const EXPECTED_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-content-type-options",
    "x-frame-options",
];

/// A response missing one or more expected security headers.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderFinding {
    /// URL of the response.
    pub url: String,
    /// Transport correlation ID of the request.
    pub request: Option<RequestId>,
    /// Header names absent from the response.
    pub missing: Vec<String>,
}

/// Flags responses that lack common security headers.
///
/// Runs once per request; retries of the same correlation ID are not
/// re-checked.
#[derive(Debug, Default)]
pub struct SecurityHeadersPlugin {
    findings: Mutex<Vec<HeaderFinding>>,
}

impl SecurityHeadersPlugin {
    /// Creates a checker with no findings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the findings so far.
    pub fn findings(&self) -> Vec<HeaderFinding> {
        self.findings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Plugin for SecurityHeadersPlugin {
    fn name(&self) -> &str {
        "Security Headers"
    }

    fn id(&self) -> &str {
        "cr-p-0002"
    }

    fn options(&self) -> PluginOptions {
        PluginOptions::new(ExecutionFrequency::PerRequest)
            .with_capabilities(CapabilitySet::new().with_listen_responses())
    }

    async fn on_event(&self, event: &EventEnvelope, _cx: &HandlerContext) -> AppResult<()> {
        let Some(response) = event.as_response() else {
            return Ok(());
        };

        let present: Vec<String> = response
            .headers
            .keys()
            .map(|k| k.to_ascii_lowercase())
            .collect();
        let missing: Vec<String> = EXPECTED_HEADERS
            .iter()
            .filter(|h| !present.iter().any(|p| p == *h))
            .map(|h| h.to_string())
            .collect();

        if missing.is_empty() {
            debug!(url = %event.context.url, "All expected security headers present");
            return Ok(());
        }

        debug!(
            url = %event.context.url,
            missing = missing.len(),
            "Response missing security headers"
        );
        self.findings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(HeaderFinding {
                url: event.context.url.clone(),
                request: event.context.request.clone(),
                missing,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crawlhub_core::types::PageId;
    use crawlhub_plugin::events::{EventContext, HttpResponse};
    use crawlhub_plugin::PluginManager;

    use super::*;

    fn response_envelope(request: &str, headers: &[(&str, &str)]) -> EventEnvelope {
        let headers: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let context = EventContext::new(PageId::new(), "https://example.com/a")
            .with_request(RequestId::new(request));
        EventEnvelope::http_response(
            context,
            HttpResponse {
                status: 200,
                headers,
                body: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_flags_missing_headers_once_per_request() {
        let plugin = Arc::new(SecurityHeadersPlugin::new());
        let manager = PluginManager::default();
        manager.load_plugin(plugin.clone()).await.unwrap();

        manager
            .dispatch_event(response_envelope("1000.1", &[("Content-Type", "text/html")]))
            .await;
        // retry with the same correlation ID is not re-checked
        manager
            .dispatch_event(response_envelope("1000.1", &[("Content-Type", "text/html")]))
            .await;

        let findings = plugin.findings();
        assert_eq!(findings.len(), 1);
        assert!(findings[0]
            .missing
            .contains(&"content-security-policy".to_string()));
    }

    #[tokio::test]
    async fn test_header_match_is_case_insensitive() {
        let plugin = Arc::new(SecurityHeadersPlugin::new());
        let manager = PluginManager::default();
        manager.load_plugin(plugin.clone()).await.unwrap();

        manager
            .dispatch_event(response_envelope(
                "1000.2",
                &[
                    ("Strict-Transport-Security", "max-age=63072000"),
                    ("Content-Security-Policy", "default-src 'self'"),
                    ("X-Content-Type-Options", "nosniff"),
                    ("X-Frame-Options", "DENY"),
                ],
            ))
            .await;

        assert!(plugin.findings().is_empty());
    }
}

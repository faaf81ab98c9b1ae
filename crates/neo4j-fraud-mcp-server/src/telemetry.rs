//! Best-effort usage telemetry. Events are posted from a background task;
//! delivery failures are logged and never surface to the calling handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

const EVENT_POST_TIMEOUT: Duration = Duration::from_secs(5);

/// A single named telemetry event.
#[derive(Debug, Clone, Serialize)]
pub struct TrackEvent {
    pub event: String,
    pub properties: Map<String, Value>,
}

pub struct TelemetryService {
    enabled: AtomicBool,
    client: reqwest::Client,
    endpoint: Url,
}

impl TelemetryService {
    pub fn new(endpoint: Url, enabled: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(EVENT_POST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            enabled: AtomicBool::new(enabled),
            client,
            endpoint,
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn new_tools_event(&self, tool_name: &str) -> TrackEvent {
        TrackEvent {
            event: "MCP_TOOL_USED".to_string(),
            properties: match json!({ "tool": tool_name }) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    pub fn new_startup_event(&self, version: &str, transport: &str) -> TrackEvent {
        TrackEvent {
            event: "MCP_SERVER_STARTED".to_string(),
            properties: match json!({ "version": version, "transport": transport }) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// Emits a named event for a tool invocation. Fire-and-forget: the post
    /// happens on a background task and cannot fail the handler.
    pub fn emit_tool_event(&self, tool_name: &str) {
        let event = self.new_tools_event(tool_name);
        self.emit_event(event);
    }

    pub fn emit_event(&self, event: TrackEvent) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            post_event(&client, endpoint, event).await;
        });
    }
}

async fn post_event(client: &reqwest::Client, endpoint: Url, event: TrackEvent) {
    let event_name = event.event.clone();
    match client.post(endpoint).json(&event).send().await {
        Ok(response) if !response.status().is_success() => {
            debug!(
                event = %event_name,
                status = %response.status(),
                "telemetry event rejected"
            );
        }
        Ok(_) => {}
        Err(e) => {
            debug!(event = %event_name, error = %e, "failed to post telemetry event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(endpoint: &str, enabled: bool) -> TelemetryService {
        TelemetryService::new(Url::parse(endpoint).unwrap(), enabled)
    }

    #[test]
    fn tools_event_carries_the_tool_name() {
        let telemetry = service("http://localhost:9/events", true);
        let event = telemetry.new_tools_event("get-schema");

        assert_eq!(event.event, "MCP_TOOL_USED");
        assert_eq!(event.properties.get("tool"), Some(&json!("get-schema")));
    }

    #[tokio::test]
    async fn events_are_posted_to_the_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .match_body(mockito::Matcher::PartialJson(
                json!({"event": "MCP_TOOL_USED"}),
            ))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let telemetry = service(&format!("{}/events", server.url()), true);
        let event = telemetry.new_tools_event("read-cypher");
        post_event(&telemetry.client, telemetry.endpoint.clone(), event).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn disabled_service_drops_events() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .expect(0)
            .create_async()
            .await;

        let telemetry = service(&format!("{}/events", server.url()), false);
        telemetry.emit_tool_event("get-schema");
        tokio::task::yield_now().await;

        mock.assert_async().await;
    }
}

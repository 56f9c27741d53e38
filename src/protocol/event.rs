//! Event message types.
//!
//! Events are notifications sent from the bridge to the host when browser
//! activity occurs. They need no reply.
//!
//! | Method | Meaning |
//! |--------|---------|
//! | `network.beforeRequestSent` | A tab is about to issue a request |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture::ObservedRequest;
use crate::identifiers::{RequestId, TabId};

// ============================================================================
// Event
// ============================================================================

/// An event notification from the bridge.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "type": "event",
///   "method": "network.beforeRequestSent",
///   "params": { "requestId": "42", "url": "...", "method": "GET", "tabId": 3 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: RequestId,

    /// Event type marker (always "event").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            "network.beforeRequestSent" => {
                ParsedEvent::NetworkBeforeRequestSent(ObservedRequest {
                    request_id: self.get_string("requestId"),
                    url: self.get_string("url"),
                    method: self.get_string_or("method", "GET"),
                    tab_id: self
                        .params
                        .get("tabId")
                        .and_then(Value::as_i64)
                        .and_then(TabId::new),
                })
            }

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a string from params with default.
    #[inline]
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Network request about to be sent.
    NetworkBeforeRequestSent(ObservedRequest),

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_before_request_parsing() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "event",
            "method": "network.beforeRequestSent",
            "params": {
                "requestId": "42",
                "url": "https://cdn.example.com/master.m3u8",
                "method": "GET",
                "tabId": 3
            }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        assert_eq!(event.method, "network.beforeRequestSent");

        match event.parse() {
            ParsedEvent::NetworkBeforeRequestSent(request) => {
                assert_eq!(request.request_id, "42");
                assert_eq!(request.url, "https://cdn.example.com/master.m3u8");
                assert_eq!(request.tab_id.map(|t| t.as_u32()), Some(3));
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_tabless_request_and_default_method() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "event",
            "method": "network.beforeRequestSent",
            "params": { "url": "https://a/master.m3u8", "tabId": -1 }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        match event.parse() {
            ParsedEvent::NetworkBeforeRequestSent(request) => {
                assert_eq!(request.tab_id, None);
                assert_eq!(request.method, "GET");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "event",
            "method": "content.videoDetected",
            "params": { "url": "blob:abc" }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        match event.parse() {
            ParsedEvent::Unknown { method, .. } => {
                assert_eq!(method, "content.videoDetected");
            }
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }
}

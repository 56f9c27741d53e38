//! Display-surface messages.
//!
//! Display surfaces (popup, CLI) talk to the host with request/response
//! pairs correlated by `id`.
//!
//! | Action | Payload | Reply |
//! |--------|---------|-------|
//! | `toggleCapture` | `{enabled}` | `{success, isCapturing}` |
//! | `getStreams` | `{}` | `{streams}` |
//! | `getState` | `{}` | `{isCapturing, badge}` |
//! | `clearStreams` | `{}` | `{success}` |
//! | `sendToProxy` | `{url}` | `{success, result}` or `{success: false, error}` |
//!
//! # Format
//!
//! ```json
//! { "id": "uuid", "type": "message", "action": "toggleCapture", "enabled": true }
//! { "id": "uuid", "type": "reply", "success": true, "isCapturing": true }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::capture::StreamRecord;
use crate::forward::ProxyResult;
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// `type` marker of display-surface messages.
pub const MESSAGE_TYPE: &str = "message";

/// `type` marker of host replies.
pub const REPLY_TYPE: &str = "reply";

// ============================================================================
// HostRequest
// ============================================================================

/// Action requested by a display surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostRequest {
    /// Enable or disable capturing.
    ToggleCapture {
        /// New capture state.
        enabled: bool,
    },
    /// Read the persisted list.
    GetStreams,
    /// Read the capture flag and badge.
    GetState,
    /// Clear working set and persisted list.
    ClearStreams,
    /// Forward a URL to the proxy server.
    SendToProxy {
        /// URL to forward.
        url: String,
    },
}

impl HostRequest {
    /// Returns the action name.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::ToggleCapture { .. } => "toggleCapture",
            Self::GetStreams => "getStreams",
            Self::GetState => "getState",
            Self::ClearStreams => "clearStreams",
            Self::SendToProxy { .. } => "sendToProxy",
        }
    }

    /// Returns `true` if `action` names a supported action.
    #[must_use]
    pub fn is_known_action(action: &str) -> bool {
        matches!(
            action,
            "toggleCapture" | "getStreams" | "getState" | "clearStreams" | "sendToProxy"
        )
    }
}

// ============================================================================
// HostResponse
// ============================================================================

/// Reply payload for a [`HostRequest`].
///
/// Variant order matters for deserialization: payloads are matched
/// against the most specific shape first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum HostResponse {
    /// `getStreams` reply.
    Streams {
        /// Persisted records, newest first.
        streams: Vec<StreamRecord>,
    },
    /// `toggleCapture` reply.
    Toggled {
        /// Always `true`.
        success: bool,
        /// Capture flag after the toggle.
        is_capturing: bool,
    },
    /// `getState` reply.
    State {
        /// Persisted capture flag.
        is_capturing: bool,
        /// Current badge text.
        badge: String,
    },
    /// Successful `sendToProxy` reply.
    Proxied {
        /// Always `true`.
        success: bool,
        /// Proxy server answer.
        result: ProxyResult,
    },
    /// Any failed action.
    Failed {
        /// Always `false`.
        success: bool,
        /// Error message.
        error: String,
    },
    /// `clearStreams` reply.
    Done {
        /// Always `true`.
        success: bool,
    },
}

impl HostResponse {
    /// Creates a failure reply.
    #[inline]
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            success: false,
            error: error.into(),
        }
    }

    /// Creates a plain success reply.
    #[inline]
    #[must_use]
    pub const fn done() -> Self {
        Self::Done { success: true }
    }

    /// Returns the error message of a failure reply.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// A display-surface message on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Correlation ID echoed in the reply.
    pub id: RequestId,

    /// Always [`MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub message_type: &'static str,

    /// Requested action.
    #[serde(flatten)]
    pub request: HostRequest,
}

impl Message {
    /// Wraps a request with a fresh ID.
    #[inline]
    #[must_use]
    pub fn new(request: HostRequest) -> Self {
        Self {
            id: RequestId::generate(),
            message_type: MESSAGE_TYPE,
            request,
        }
    }
}

/// A host reply on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// Matches the message `id`.
    pub id: RequestId,

    /// Always [`REPLY_TYPE`].
    #[serde(rename = "type")]
    pub reply_type: String,

    /// Reply payload.
    #[serde(flatten)]
    pub response: HostResponse,
}

impl Reply {
    /// Creates a reply to message `id`.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, response: HostResponse) -> Self {
        Self {
            id,
            reply_type: REPLY_TYPE.to_string(),
            response,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_message_serialization() {
        let message = Message::new(HostRequest::ToggleCapture { enabled: true });
        let value = serde_json::to_value(&message).expect("serialize");

        assert_eq!(value["type"], "message");
        assert_eq!(value["action"], "toggleCapture");
        assert_eq!(value["enabled"], true);
        assert_eq!(value["id"], message.id.to_string());
    }

    #[test]
    fn test_request_parsing_ignores_envelope_fields() {
        let value = json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "message",
            "action": "getStreams"
        });
        let request: HostRequest = serde_json::from_value(value).expect("parse");
        assert_eq!(request, HostRequest::GetStreams);

        let value = json!({ "action": "sendToProxy", "url": "https://a/master.m3u8" });
        let request: HostRequest = serde_json::from_value(value).expect("parse");
        assert_eq!(request.action(), "sendToProxy");
    }

    #[test]
    fn test_unknown_action_rejected() {
        let value = json!({ "action": "videoDetected", "url": "blob:x" });
        assert!(serde_json::from_value::<HostRequest>(value).is_err());
        assert!(!HostRequest::is_known_action("videoDetected"));
        assert!(HostRequest::is_known_action("clearStreams"));
    }

    #[test]
    fn test_reply_shapes() {
        let id = RequestId::generate();

        let toggled = Reply::new(
            id,
            HostResponse::Toggled {
                success: true,
                is_capturing: false,
            },
        );
        let value = serde_json::to_value(&toggled).expect("serialize");
        assert_eq!(value["type"], "reply");
        assert_eq!(value["success"], true);
        assert_eq!(value["isCapturing"], false);

        let failed = serde_json::to_value(Reply::new(id, HostResponse::failed("boom")))
            .expect("serialize");
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "boom");
    }

    #[test]
    fn test_reply_parsing_picks_matching_shape() {
        let parse = |v: serde_json::Value| -> HostResponse {
            serde_json::from_value::<Reply>(v).expect("parse").response
        };
        let id = "550e8400-e29b-41d4-a716-446655440000";

        assert_eq!(
            parse(json!({ "id": id, "type": "reply", "success": true })),
            HostResponse::done()
        );
        assert_eq!(
            parse(json!({ "id": id, "type": "reply", "success": false, "error": "x" })),
            HostResponse::failed("x")
        );
        assert_eq!(
            parse(json!({ "id": id, "type": "reply", "streams": [] })),
            HostResponse::Streams { streams: vec![] }
        );
        assert_eq!(
            parse(json!({ "id": id, "type": "reply", "isCapturing": true, "badge": "2" })),
            HostResponse::State {
                is_capturing: true,
                badge: "2".into()
            }
        );
        assert!(matches!(
            parse(json!({
                "id": id, "type": "reply", "success": true,
                "result": { "proxyUrl": "http://p/1" }
            })),
            HostResponse::Proxied { .. }
        ));
    }
}

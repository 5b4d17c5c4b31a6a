//! Wire records for the upload/edit protocol.
//!
//! Uploads arrive as binary frames carrying raw image bytes; edits arrive as
//! text frames. Responses are ordered by the strictly sequential
//! per-connection processing loop — the edit path carries no correlation id,
//! so a client must await each response before sending its next request on
//! the same connection.

use serde::{Deserialize, Serialize};

use visage_core::bundle::FeatureBundle;
use visage_core::params::EditParams;

/// Text-frame request: re-render a cached session with new parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct EditRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub params: EditParams,
}

/// Successful upload reply: the session handle plus where the face sits in
/// the uploaded image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub id: String,
    pub center: [f32; 2],
    pub size: f32,
    pub corners: [[f32; 2]; 4],
    /// Radians, counter-clockwise.
    pub angle: f32,
}

impl From<&FeatureBundle> for SessionDescriptor {
    fn from(bundle: &FeatureBundle) -> Self {
        let bbox = &bundle.features.bounding_box;
        Self {
            id: bundle.session_id.to_string(),
            center: bbox.center,
            size: bbox.size,
            corners: bbox.corners,
            angle: bbox.angle,
        }
    }
}

/// Failure reply for either channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One outbound frame.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(String),
    Binary(Vec<u8>),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Self {
        Self::Json(
            serde_json::to_string(value)
                .unwrap_or_else(|_| r#"{"error":"response serialization failed"}"#.to_string()),
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::json(&ErrorResponse {
            error: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_request_parses_camel_case_session_id() {
        let json = r#"{"sessionId": "face_123", "params": {"smile": 1.0}}"#;
        let req: EditRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.session_id, "face_123");
        assert_eq!(req.params.smile, 1.0);
    }

    #[test]
    fn edit_request_params_are_optional() {
        let req: EditRequest = serde_json::from_str(r#"{"sessionId": "face_123"}"#).unwrap();
        assert!(req.params.is_noop());
    }

    #[test]
    fn edit_request_ignores_unknown_parameter_names() {
        let json = r#"{"sessionId": "face_1", "params": {"smile": 0.5, "halo": 3.0}}"#;
        let req: EditRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.params.smile, 0.5);
    }

    #[test]
    fn edit_request_without_session_id_fails() {
        let result: Result<EditRequest, _> = serde_json::from_str(r#"{"params": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn descriptor_serializes_every_field() {
        let descriptor = SessionDescriptor {
            id: "face_abc".into(),
            center: [10.0, 20.0],
            size: 64.0,
            corners: [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            angle: 0.1,
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["id"], "face_abc");
        assert_eq!(json["center"][1], 20.0);
        assert_eq!(json["corners"][2][0], 1.0);
        assert!((json["angle"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn error_reply_is_a_structured_record() {
        let reply = Reply::error("session not found: face_1");
        let Reply::Json(body) = reply else {
            panic!("expected a JSON reply");
        };
        let parsed: ErrorResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.error, "session not found: face_1");
    }
}

use thiserror::Error;

/// Protocol-facing error taxonomy.
///
/// `Clone` because a single failed extraction is broadcast to every caller
/// waiting on the same content hash.
#[derive(Clone, Debug, Error)]
pub enum VisageError {
    #[error("no face detected in the source image")]
    NoFaceDetected,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("image encoding failed: {0}")]
    Encoding(String),
}

impl VisageError {
    /// Stable snake_case label for logging and metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NoFaceDetected => "no_face_detected",
            Self::SessionNotFound(_) => "session_not_found",
            Self::MalformedRequest(_) => "malformed_request",
            Self::ModelInference(_) => "model_inference",
            Self::Encoding(_) => "encoding",
        }
    }

    /// True when the client can fix the problem itself (different photo,
    /// re-upload, corrected payload).
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::NoFaceDetected | Self::SessionNotFound(_) | Self::MalformedRequest(_)
        )
    }

    /// Message safe to send to a client. Internal failure detail stays in the
    /// server logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoFaceDetected | Self::SessionNotFound(_) | Self::MalformedRequest(_) => {
                self.to_string()
            }
            Self::ModelInference(_) => "face rendering failed".to_string(),
            Self::Encoding(_) => "failed to encode the rendered image".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_correctable_classification() {
        assert!(VisageError::NoFaceDetected.is_user_correctable());
        assert!(VisageError::SessionNotFound("face_1".into()).is_user_correctable());
        assert!(VisageError::MalformedRequest("bad json".into()).is_user_correctable());
        assert!(!VisageError::ModelInference("cuda oom".into()).is_user_correctable());
        assert!(!VisageError::Encoding("jpeg".into()).is_user_correctable());
    }

    #[test]
    fn internal_detail_is_not_surfaced() {
        let err = VisageError::ModelInference("device 0 out of memory".into());
        assert!(!err.user_message().contains("out of memory"));

        let err = VisageError::Encoding("buffer overrun at byte 12".into());
        assert!(!err.user_message().contains("overrun"));
    }

    #[test]
    fn user_correctable_detail_is_surfaced() {
        let err = VisageError::SessionNotFound("face_123".into());
        assert!(err.user_message().contains("face_123"));

        assert_eq!(
            VisageError::NoFaceDetected.user_message(),
            "no face detected in the source image"
        );
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(VisageError::NoFaceDetected.error_kind(), "no_face_detected");
        assert_eq!(
            VisageError::SessionNotFound(String::new()).error_kind(),
            "session_not_found"
        );
        assert_eq!(
            VisageError::ModelInference(String::new()).error_kind(),
            "model_inference"
        );
    }
}

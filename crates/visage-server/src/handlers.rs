//! Upload/edit dispatch against the shared engine state.

use std::sync::Arc;

use bytes::Bytes;

use visage_core::errors::VisageError;
use visage_core::ids::SessionId;
use visage_engine::{editor, Compositor};
use visage_store::SessionStore;

use crate::protocol::{EditRequest, Reply, SessionDescriptor};

/// Shared state available to every connection.
pub struct HandlerState {
    pub store: Arc<SessionStore>,
    pub compositor: Compositor,
}

impl HandlerState {
    pub fn new(store: Arc<SessionStore>, compositor: Compositor) -> Self {
        Self { store, compositor }
    }
}

/// Handle one binary frame: ingest the image, reply with a session
/// descriptor. Failures never allocate a session id.
pub async fn handle_upload(state: &HandlerState, payload: Bytes) -> Reply {
    match state.store.ingest(payload).await {
        Ok(bundle) => Reply::json(&SessionDescriptor::from(bundle.as_ref())),
        Err(e) => reject("upload", e),
    }
}

/// Handle one text frame: parse, look up the session, apply the edit, render.
pub async fn handle_edit(state: &HandlerState, raw: &str) -> Reply {
    let request: EditRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => return reject("edit", VisageError::MalformedRequest(e.to_string())),
    };

    let session_id = SessionId::from_raw(request.session_id);
    let bundle = match state.store.lookup(&session_id) {
        Ok(bundle) => bundle,
        Err(e) => return reject("edit", e),
    };

    let edited = editor::apply(
        &bundle.features.baseline.keypoints,
        &bundle.features.baseline.pose,
        &request.params,
    );

    match state.compositor.render(bundle, edited).await {
        Ok(bytes) => Reply::Binary(bytes),
        Err(e) => reject("edit", e),
    }
}

/// Convert a failure into a structured reply. Client-correctable problems log
/// quietly; internal failures keep their detail in the server log and go out
/// opaque.
fn reject(op: &'static str, err: VisageError) -> Reply {
    if err.is_user_correctable() {
        tracing::debug!(op, kind = err.error_kind(), "request rejected");
    } else {
        tracing::error!(op, kind = err.error_kind(), error = %err, "request failed");
    }
    Reply::error(err.user_message())
}

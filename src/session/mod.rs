//! AR session management.
//!
//! An [`ArSession`] drives one native AR view over a
//! [`Channel`](crate::transport::Channel) and routes the view's events to
//! the listeners bound at build time.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Session handle, builder, lifecycle and event routing |
//! | `pose` | Camera and anchor poses, distances, orientation |
//! | `media` | Snapshot and recording |
//! | `tracking` | Logo tracking and VIO status |
//! | `relay` | Native error presentation |
//!
//! # Absent and default values
//!
//! Queries never fail on transport errors. Camera and anchor poses return
//! `None` when unavailable. Logo orientation and translation fall back to
//! identity and zero, and status strings to empty. `snapshot` and
//! `stop_recording` propagate their errors.
//!
//! # Example
//!
//! ```ignore
//! let session = ArSession::builder(channel)
//!     .error_presenter(LogPresenter)
//!     .debug(true)
//!     .build()?;
//!
//! let a = Anchor::new("table");
//! let b = Anchor::new("door");
//! if let Some(meters) = session.distance_between_anchors(&a, &b).await? {
//!     println!("{meters:.2} m");
//! }
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod media;
mod pose;
mod tracking;

/// Native error presentation.
pub mod relay;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{ArSession, SessionBuilder, SessionState, TapListener};
pub use relay::{ErrorNotice, ErrorPresenter, ErrorRelay, LogPresenter};

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use futures_util::{SinkExt, StreamExt};
    use nalgebra::Vector3;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    use crate::ar::HitTestResult;
    use crate::identifiers::SessionId;
    use crate::transport::ConnectionPool;

    #[tokio::test]
    async fn test_session_over_websocket() {
        let pool = ConnectionPool::new().await.expect("pool creation");
        let session_id = SessionId::next();

        let (mut ws, _) = connect_async(pool.ws_url()).await.expect("connect");
        let ready = json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "type": "success",
            "result": { "sessionId": session_id.as_u32(), "channel": session_id.channel_name() }
        });
        ws.send(Message::Text(ready.to_string().into()))
            .await
            .expect("send ready");

        let taps: Arc<Mutex<Vec<HitTestResult>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&taps);
        let session = ArSession::attach(&pool, session_id)
            .await
            .expect("attach")
            .error_presenter(LogPresenter)
            .on_plane_or_point_tap(move |results| sink.lock().extend(results))
            .build()
            .expect("build");
        assert_eq!(session.session_id(), session_id);

        // Fake native view: answers pose queries and pushes one tap first.
        let native = tokio::spawn(async move {
            let mut pose = vec![0.0; 16];
            for i in [0, 5, 10, 15] {
                pose[i] = 1.0;
            }
            pose[12] = 1.0;
            pose[13] = 2.0;
            pose[14] = 3.0;

            let tap = json!({
                "id": uuid::Uuid::new_v4(),
                "type": "event",
                "method": "onPlaneOrPointTap",
                "params": [{ "type": "plane", "worldTransform": pose }],
            });
            ws.send(Message::Text(tap.to_string().into()))
                .await
                .expect("send tap");

            let mut methods = Vec::new();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: Value = serde_json::from_str(&text).expect("request json");
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let result = match method.as_str() {
                    "getCameraPose" => json!(pose),
                    _ => Value::Null,
                };
                let reply = json!({ "id": request["id"], "type": "success", "result": result });
                ws.send(Message::Text(reply.to_string().into()))
                    .await
                    .expect("send reply");
                methods.push(method);
            }
            methods
        });

        let camera = session.camera_pose().await.expect("camera pose");
        assert_eq!(camera.translation(), Vector3::new(1.0, 2.0, 3.0));

        session.dispose().await;
        assert_eq!(session.state(), SessionState::Disposed);

        let methods = native.await.expect("native task");
        assert_eq!(methods, vec!["getCameraPose".to_string(), "dispose".to_string()]);
        assert_eq!(taps.lock().len(), 1);

        // Disposal frees the pool slot for this session.
        assert!(pool.connection(session_id).is_err());
        let pruned = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while pool.connection_count() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(pruned.is_ok(), "disposed session still pooled");

        pool.shutdown().await;
    }
}

//! Camera and anchor pose queries.

use nalgebra::UnitQuaternion;

use crate::ar::transform::decode_quaternion;
use crate::ar::{Anchor, Transform};
use crate::error::Result;
use crate::protocol::Command;

use super::ArSession;

// ============================================================================
// ArSession - Poses
// ============================================================================

impl ArSession {
    /// Returns the camera pose in world space.
    ///
    /// `None` if the native layer has no pose, the query fails or the
    /// session is disposed.
    pub async fn camera_pose(&self) -> Option<Transform> {
        let value = self.inner.query(Command::GetCameraPose).await?;
        self.inner
            .decoded("getCameraPose", Transform::from_value(&value))
    }

    /// Returns the pose of an anchor in world space.
    ///
    /// `Ok(None)` if the anchor is unknown to the native layer or the query
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// the anchor name is empty. Nothing is sent in that case.
    pub async fn pose(&self, anchor: &Anchor) -> Result<Option<Transform>> {
        let anchor_id = anchor.require_name()?.to_string();

        let Some(value) = self.inner.query(Command::GetAnchorPose { anchor_id }).await else {
            return Ok(None);
        };

        Ok(self
            .inner
            .decoded("getAnchorPose", Transform::from_value(&value)))
    }

    /// Returns the distance between two anchors, in meters.
    ///
    /// Both poses are queried concurrently. `Ok(None)` if either is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// either anchor name is empty.
    pub async fn distance_between_anchors(&self, a: &Anchor, b: &Anchor) -> Result<Option<f64>> {
        a.require_name()?;
        b.require_name()?;

        let (pose_a, pose_b) = tokio::join!(self.pose(a), self.pose(b));

        Ok(match (pose_a?, pose_b?) {
            (Some(pa), Some(pb)) => Some(pa.distance_to(&pb)),
            _ => None,
        })
    }

    /// Returns the distance from the camera to an anchor, in meters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// the anchor name is empty.
    pub async fn distance_from_anchor(&self, anchor: &Anchor) -> Result<Option<f64>> {
        anchor.require_name()?;

        let (camera, pose) = tokio::join!(self.camera_pose(), self.pose(anchor));

        Ok(match (camera, pose?) {
            (Some(camera), Some(pose)) => Some(camera.distance_to(&pose)),
            _ => None,
        })
    }

    /// Returns the camera orientation.
    ///
    /// `None` on failure or a malformed payload.
    pub async fn camera_orientation(&self) -> Option<UnitQuaternion<f64>> {
        let value = self.inner.query(Command::GetCameraOrientation).await?;
        self.inner
            .decoded("getCameraOrientation", decode_quaternion(&value))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use nalgebra::{UnitQuaternion, Vector3};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tracing_subscriber::fmt::MakeWriter;

    use crate::error::Error;
    use crate::session::mock::MockChannel;
    use crate::session::{ArSession, LogPresenter};

    use super::*;

    fn session(mock: &Arc<MockChannel>, debug: bool) -> ArSession {
        ArSession::builder(mock.clone())
            .error_presenter(LogPresenter)
            .debug(debug)
            .build()
            .expect("build")
    }

    fn at(x: f64, y: f64, z: f64) -> Value {
        let t = Transform::from_parts(Vector3::new(x, y, z), UnitQuaternion::identity());
        json!(t.encode().to_vec())
    }

    // Captures formatted log lines.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl LogBuffer {
        fn lines(&self) -> usize {
            String::from_utf8_lossy(&self.0.lock()).lines().count()
        }
    }

    fn capture() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .with_env_filter("warn")
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (buffer, guard)
    }

    #[tokio::test]
    async fn test_camera_pose_decodes_translation() {
        let mock = MockChannel::new(20);
        mock.respond("getCameraPose", at(0.5, 1.5, -2.0));
        let session = session(&mock, false);

        let pose = session.camera_pose().await.expect("pose");
        assert_eq!(pose.translation(), Vector3::new(0.5, 1.5, -2.0));
    }

    #[tokio::test]
    async fn test_camera_pose_null_is_absent() {
        let mock = MockChannel::new(21);
        let session = session(&mock, false);
        assert!(session.camera_pose().await.is_none());
        assert_eq!(mock.call_count("getCameraPose"), 1);
    }

    #[tokio::test]
    async fn test_camera_pose_failure_logs_once_in_debug() {
        let mock = MockChannel::new(22);
        mock.fail("getCameraPose");
        let session = session(&mock, true);

        let (logs, _guard) = capture();
        assert!(session.camera_pose().await.is_none());
        assert_eq!(logs.lines(), 1);
    }

    #[tokio::test]
    async fn test_camera_pose_failure_is_silent_without_debug() {
        let mock = MockChannel::new(23);
        mock.fail("getCameraPose");
        let session = session(&mock, false);

        let (logs, _guard) = capture();
        assert!(session.camera_pose().await.is_none());
        assert_eq!(logs.lines(), 0);
    }

    #[tokio::test]
    async fn test_malformed_pose_is_absent() {
        let mock = MockChannel::new(24);
        mock.respond("getCameraPose", json!([1.0, 2.0, 3.0]));
        let session = session(&mock, false);
        assert!(session.camera_pose().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_anchor_name_sends_nothing() {
        let mock = MockChannel::new(25);
        let session = session(&mock, false);

        let err = session.pose(&Anchor::new("")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = session
            .distance_between_anchors(&Anchor::new("a"), &Anchor::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        assert!(session.distance_from_anchor(&Anchor::new("")).await.is_err());
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_anchor_pose_sends_anchor_id() {
        let mock = MockChannel::new(26);
        mock.respond("getAnchorPose", at(1.0, 0.0, 0.0));
        let session = session(&mock, false);

        let pose = session.pose(&Anchor::new("a1")).await.expect("pose");
        assert!(pose.is_some());
        assert_eq!(
            mock.calls(),
            vec![Command::GetAnchorPose {
                anchor_id: "a1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_distance_between_anchors() {
        let mock = MockChannel::new(27);
        mock.respond_anchor("origin", at(0.0, 0.0, 0.0));
        mock.respond_anchor("corner", at(3.0, 4.0, 0.0));
        mock.respond("getCameraPose", at(3.0, 0.0, 0.0));
        let session = session(&mock, false);

        let origin = Anchor::new("origin");
        let corner = Anchor::new("corner");
        let distance = session.distance_between_anchors(&origin, &corner).await;
        assert_eq!(distance.expect("ok"), Some(5.0));

        let distance = session.distance_from_anchor(&corner).await;
        assert_eq!(distance.expect("ok"), Some(4.0));
        assert_eq!(mock.call_count("getAnchorPose"), 3);
    }

    #[tokio::test]
    async fn test_distance_absent_when_anchor_missing() {
        let mock = MockChannel::new(31);
        mock.respond_anchor("known", at(1.0, 1.0, 1.0));
        let session = session(&mock, false);

        let distance = session
            .distance_between_anchors(&Anchor::new("known"), &Anchor::new("gone"))
            .await;
        assert_eq!(distance.expect("ok"), None);
    }

    #[tokio::test]
    async fn test_distance_absent_when_pose_missing() {
        let mock = MockChannel::new(28);
        mock.respond("getAnchorPose", at(3.0, 4.0, 0.0));
        mock.fail("getCameraPose");
        let session = session(&mock, false);

        let distance = session.distance_from_anchor(&Anchor::new("a")).await;
        assert_eq!(distance.expect("ok"), None);
    }

    #[tokio::test]
    async fn test_camera_orientation() {
        let mock = MockChannel::new(29);
        mock.respond("getCameraOrientation", json!([0.0, 0.0, 0.0, 1.0]));
        let session = session(&mock, false);

        let q = session.camera_orientation().await.expect("orientation");
        assert_eq!(q, UnitQuaternion::identity());

        mock.respond("getCameraOrientation", json!("bad"));
        assert!(session.camera_orientation().await.is_none());
    }

    #[tokio::test]
    async fn test_queries_after_dispose_send_nothing() {
        let mock = MockChannel::new(30);
        let session = session(&mock, false);
        session.dispose().await;
        let before = mock.total_calls();

        assert!(session.camera_pose().await.is_none());
        assert_eq!(session.pose(&Anchor::new("a")).await.expect("ok"), None);
        assert!(session.camera_orientation().await.is_none());
        assert_eq!(mock.total_calls(), before);
    }
}

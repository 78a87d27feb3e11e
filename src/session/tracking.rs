//! Logo tracking and visual-inertial odometry status.
//!
//! The logo index is set by [`ArSession::enable_logo_tracking`] and read by
//! the other logo queries. The enable holds the write guard across its round
//! trip, so a concurrent query waits for the new index instead of reading the
//! unset one.

use nalgebra::{UnitQuaternion, Vector3};
use serde_json::Value;
use tracing::debug;

use crate::ar::transform::{decode_quaternion, decode_vector3};
use crate::identifiers::LogoIndex;
use crate::protocol::Command;

use super::ArSession;

// ============================================================================
// ArSession - Logo Tracking
// ============================================================================

impl ArSession {
    /// Enables logo tracking and stores the returned tracker index.
    ///
    /// Always returns `true`. An unavailable tracker or a failed query stores
    /// an unset index, which the other logo queries treat as "not tracked".
    pub async fn enable_logo_tracking(&self) -> bool {
        let mut index = self.inner.logo_index.write().await;

        let raw = self
            .inner
            .query(Command::EnableLogoTracking)
            .await
            .and_then(|v| v.as_i64());

        *index = raw.map_or(LogoIndex::UNSET, LogoIndex::new);
        debug!(session_id = %self.inner.session_id, index = index.as_i64(), "Logo tracking enabled");
        true
    }

    /// Returns `true` if the logo is currently tracked.
    ///
    /// `false` without a round trip while the index is unset.
    pub async fn is_logo_tracked(&self) -> bool {
        let Some(index) = self.logo_index().await else {
            return false;
        };

        self.inner
            .query(Command::IsLogoTracked { index })
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Returns the logo orientation, or identity when unavailable.
    pub async fn quaternion_from_logo(&self) -> UnitQuaternion<f64> {
        let Some(index) = self.logo_index().await else {
            return UnitQuaternion::identity();
        };

        self.inner
            .query(Command::GetQuaternionFromLogo { index })
            .await
            .and_then(|v| self.inner.decoded("getQuaternionFromLogo", decode_quaternion(&v)))
            .unwrap_or_else(UnitQuaternion::identity)
    }

    /// Returns the logo translation, or zero when unavailable.
    pub async fn translation_from_logo(&self) -> Vector3<f64> {
        let Some(index) = self.logo_index().await else {
            return Vector3::zeros();
        };

        self.inner
            .query(Command::GetTranslationFromLogo { index })
            .await
            .and_then(|v| self.inner.decoded("getTranslationFromLogo", decode_vector3(&v)))
            .unwrap_or_else(Vector3::zeros)
    }

    /// Returns the stored index if set.
    async fn logo_index(&self) -> Option<LogoIndex> {
        let index = *self.inner.logo_index.read().await;
        index.is_set().then_some(index)
    }
}

// ============================================================================
// ArSession - VIO Status
// ============================================================================

impl ArSession {
    /// Returns the native tracking status, or an empty string.
    pub async fn vio_tracking_status(&self) -> String {
        text(self.inner.query(Command::GetTrackingStatus).await)
    }

    /// Returns the native tracking error, or an empty string.
    pub async fn vio_tracking_error(&self) -> String {
        text(self.inner.query(Command::GetTrackingError).await)
    }
}

/// Reads a string result, defaulting to empty.
fn text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::session::mock::MockChannel;
    use crate::session::{ArSession, LogPresenter};

    use super::*;

    fn session(mock: &Arc<MockChannel>) -> ArSession {
        ArSession::builder(mock.clone())
            .error_presenter(LogPresenter)
            .build()
            .expect("build")
    }

    #[tokio::test]
    async fn test_logo_queries_before_enable_send_nothing() {
        let mock = MockChannel::new(50);
        let session = session(&mock);

        assert!(!session.is_logo_tracked().await);
        assert_eq!(session.quaternion_from_logo().await, UnitQuaternion::identity());
        assert_eq!(session.translation_from_logo().await, Vector3::zeros());
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_enable_then_query_uses_index() {
        let mock = MockChannel::new(51);
        mock.respond("enableLogoTracking", json!(4));
        mock.respond("isLogoTracked", json!(true));
        mock.respond("getTranslationFromLogo", json!([0.1, 0.2, 0.3]));
        let session = session(&mock);

        assert!(session.enable_logo_tracking().await);
        assert!(session.is_logo_tracked().await);
        assert_eq!(session.translation_from_logo().await, Vector3::new(0.1, 0.2, 0.3));

        let calls = mock.calls();
        assert!(calls.contains(&Command::IsLogoTracked {
            index: LogoIndex::new(4)
        }));
    }

    #[tokio::test]
    async fn test_unavailable_tracker_stays_unset() {
        let mock = MockChannel::new(52);
        mock.respond("enableLogoTracking", json!(-1));
        let session = session(&mock);

        assert!(session.enable_logo_tracking().await);
        assert!(!session.is_logo_tracked().await);
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_enable_still_reports_true() {
        let mock = MockChannel::new(53);
        mock.fail("enableLogoTracking");
        let session = session(&mock);

        assert!(session.enable_logo_tracking().await);
        assert_eq!(session.quaternion_from_logo().await, UnitQuaternion::identity());
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_query_waits_for_enable_in_flight() {
        let mock = MockChannel::new(54);
        mock.respond("enableLogoTracking", json!(2));
        mock.delay("enableLogoTracking", Duration::from_millis(20));
        mock.respond("isLogoTracked", json!(true));
        let session = session(&mock);

        let (enabled, tracked) =
            tokio::join!(session.enable_logo_tracking(), session.is_logo_tracked());

        assert!(enabled);
        assert!(tracked);
        assert_eq!(mock.call_count("isLogoTracked"), 1);
    }

    #[tokio::test]
    async fn test_logo_defaults_on_malformed_data() {
        let mock = MockChannel::new(55);
        mock.respond("enableLogoTracking", json!(0));
        mock.respond("getQuaternionFromLogo", json!([0.0, 0.0, 0.0, 0.0]));
        mock.respond("getTranslationFromLogo", Value::Null);
        let session = session(&mock);

        session.enable_logo_tracking().await;
        assert_eq!(session.quaternion_from_logo().await, UnitQuaternion::identity());
        assert_eq!(session.translation_from_logo().await, Vector3::zeros());
    }

    #[tokio::test]
    async fn test_vio_status() {
        let mock = MockChannel::new(56);
        mock.respond("getTrackingStatus", json!("NORMAL"));
        mock.fail("getTrackingError");
        let session = session(&mock);

        assert_eq!(session.vio_tracking_status().await, "NORMAL");
        assert_eq!(session.vio_tracking_error().await, "");
    }

    #[tokio::test]
    async fn test_tracking_after_dispose() {
        let mock = MockChannel::new(57);
        mock.respond("enableLogoTracking", json!(1));
        let session = session(&mock);
        session.enable_logo_tracking().await;
        session.dispose().await;
        let before = mock.total_calls();

        assert!(!session.is_logo_tracked().await);
        assert_eq!(session.vio_tracking_status().await, "");
        assert_eq!(mock.total_calls(), before);
    }
}

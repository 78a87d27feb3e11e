//! Commands sent from the session to the native layer.
//!
//! Each variant serializes as `{"method": "<name>", "params": {...}}`.
//! Commands without arguments omit `params`.
//!
//! | Group | Commands |
//! |-------|----------|
//! | Lifecycle | `init`, `dispose` |
//! | Pose | `getCameraPose`, `getAnchorPose`, `getCameraOrientation` |
//! | Media | `snapshot`, `startRecording`, `stopRecording`, `getRecordLength` |
//! | Logo tracking | `enableLogoTracking`, `getQuaternionFromLogo`, `getTranslationFromLogo`, `isLogoTracked` |
//! | Tracking status | `getTrackingStatus`, `getTrackingError` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::ar::SessionConfig;
use crate::identifiers::LogoIndex;

// ============================================================================
// Command
// ============================================================================

/// All commands the native layer understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Configure and start the native session.
    #[serde(rename = "init")]
    Init(SessionConfig),

    /// Get the camera transform.
    #[serde(rename = "getCameraPose")]
    GetCameraPose,

    /// Get an anchor's transform.
    #[serde(rename = "getAnchorPose")]
    GetAnchorPose {
        /// Anchor name.
        #[serde(rename = "anchorId")]
        anchor_id: String,
    },

    /// Capture the current frame.
    #[serde(rename = "snapshot")]
    Snapshot,

    /// Get the camera orientation quaternion.
    #[serde(rename = "getCameraOrientation")]
    GetCameraOrientation,

    /// Start recording the AR view to a file.
    #[serde(rename = "startRecording")]
    StartRecording {
        /// Requested output path.
        path: String,
    },

    /// Stop the current recording.
    #[serde(rename = "stopRecording")]
    StopRecording,

    /// Get the duration of a recording.
    #[serde(rename = "getRecordLength")]
    GetRecordLength {
        /// Recording path.
        path: String,
    },

    /// Enable logo tracking.
    #[serde(rename = "enableLogoTracking")]
    EnableLogoTracking,

    /// Get the tracked logo's orientation.
    #[serde(rename = "getQuaternionFromLogo")]
    GetQuaternionFromLogo {
        /// Tracker handle.
        index: LogoIndex,
    },

    /// Get the tracked logo's position.
    #[serde(rename = "getTranslationFromLogo")]
    GetTranslationFromLogo {
        /// Tracker handle.
        index: LogoIndex,
    },

    /// Ask whether the logo is currently tracked.
    #[serde(rename = "isLogoTracked")]
    IsLogoTracked {
        /// Tracker handle.
        index: LogoIndex,
    },

    /// Get the visual-inertial tracking status.
    #[serde(rename = "getTrackingStatus")]
    GetTrackingStatus,

    /// Get the visual-inertial tracking error.
    #[serde(rename = "getTrackingError")]
    GetTrackingError,

    /// Tear down the native session.
    #[serde(rename = "dispose")]
    Dispose,
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::GetCameraPose => "getCameraPose",
            Self::GetAnchorPose { .. } => "getAnchorPose",
            Self::Snapshot => "snapshot",
            Self::GetCameraOrientation => "getCameraOrientation",
            Self::StartRecording { .. } => "startRecording",
            Self::StopRecording => "stopRecording",
            Self::GetRecordLength { .. } => "getRecordLength",
            Self::EnableLogoTracking => "enableLogoTracking",
            Self::GetQuaternionFromLogo { .. } => "getQuaternionFromLogo",
            Self::GetTranslationFromLogo { .. } => "getTranslationFromLogo",
            Self::IsLogoTracked { .. } => "isLogoTracked",
            Self::GetTrackingStatus => "getTrackingStatus",
            Self::GetTrackingError => "getTrackingError",
            Self::Dispose => "dispose",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json, to_value};

    #[test]
    fn test_unit_command_has_no_params() {
        let value = to_value(Command::GetCameraPose).expect("serialize");
        assert_eq!(value, json!({ "method": "getCameraPose" }));
    }

    #[test]
    fn test_anchor_pose_params() {
        let value = to_value(Command::GetAnchorPose {
            anchor_id: "table".into(),
        })
        .expect("serialize");
        assert_eq!(
            value,
            json!({ "method": "getAnchorPose", "params": { "anchorId": "table" } })
        );
    }

    #[test]
    fn test_logo_index_params() {
        let value = to_value(Command::IsLogoTracked {
            index: LogoIndex::new(3),
        })
        .expect("serialize");
        assert_eq!(value["params"]["index"], 3);
    }

    #[test]
    fn test_init_carries_config() {
        let value = to_value(Command::Init(SessionConfig::new().with_taps())).expect("serialize");
        assert_eq!(value["method"], "init");
        assert_eq!(value["params"]["handleTaps"], Value::Bool(true));
        assert_eq!(value["params"]["planeDetectionConfig"], 0);
    }

    #[test]
    fn test_method_matches_serialized_name() {
        let commands = [
            Command::Init(SessionConfig::new()),
            Command::GetCameraPose,
            Command::GetAnchorPose {
                anchor_id: "a".into(),
            },
            Command::Snapshot,
            Command::GetCameraOrientation,
            Command::StartRecording { path: "p".into() },
            Command::StopRecording,
            Command::GetRecordLength { path: "p".into() },
            Command::EnableLogoTracking,
            Command::GetQuaternionFromLogo {
                index: LogoIndex::new(0),
            },
            Command::GetTranslationFromLogo {
                index: LogoIndex::new(0),
            },
            Command::IsLogoTracked {
                index: LogoIndex::new(0),
            },
            Command::GetTrackingStatus,
            Command::GetTrackingError,
            Command::Dispose,
        ];

        for command in commands {
            let value = to_value(&command).expect("serialize");
            assert_eq!(value["method"], command.method());
        }
    }

    #[test]
    fn test_deserialize() {
        let command: Command = serde_json::from_value(json!({
            "method": "startRecording",
            "params": { "path": "/tmp/a.mp4" }
        }))
        .expect("deserialize");
        assert_eq!(
            command,
            Command::StartRecording {
                path: "/tmp/a.mp4".into()
            }
        );
    }
}

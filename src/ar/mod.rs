//! AR domain types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Transform`] | 4x4 pose with its column-major wire codec |
//! | [`HitTestResult`] | One intersection reported for a tap |
//! | [`Anchor`] | Handle to a native-tracked anchor |
//! | [`SessionConfig`] | Options sent once with `init` |
//! | [`Snapshot`] | Encoded frame capture |

// ============================================================================
// Submodules
// ============================================================================

/// Anchor handles.
pub mod anchor;

/// Session configuration.
pub mod config;


/// Frame captures.
pub mod snapshot;

/// Pose transforms and vector payload decoding.
pub mod transform;

// ============================================================================
// Re-exports
// ============================================================================

pub use anchor::Anchor;
pub use config::{PlaneDetectionConfig, SessionConfig};
pub use hit_test::{HitTestResult, HitTestResultType, decode_hit_test_results};
pub use snapshot::Snapshot;
pub use transform::Transform;

//! Session configuration passed once to `init`.
//!
//! # Example
//!
//! ```ignore
//! use ar_bridge::{PlaneDetectionConfig, SessionConfig};
//!
//! let config = SessionConfig::new()
//!     .with_plane_detection(PlaneDetectionConfig::Horizontal)
//!     .with_planes()
//!     .with_taps();
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// PlaneDetectionConfig
// ============================================================================

/// Which surfaces the native layer should detect.
///
/// Sent on the wire as its index (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlaneDetectionConfig {
    /// No plane detection.
    #[default]
    None,
    /// Horizontal planes only.
    Horizontal,
    /// Vertical planes only.
    Vertical,
    /// Both orientations.
    HorizontalAndVertical,
}

impl PlaneDetectionConfig {
    /// Returns the wire index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Horizontal => 1,
            Self::Vertical => 2,
            Self::HorizontalAndVertical => 3,
        }
    }

    /// Returns `true` if any plane detection is enabled.
    #[inline]
    #[must_use]
    pub const fn detects_planes(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl From<PlaneDetectionConfig> for u8 {
    fn from(config: PlaneDetectionConfig) -> Self {
        config.index()
    }
}

impl TryFrom<u8> for PlaneDetectionConfig {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Self::None),
            1 => Ok(Self::Horizontal),
            2 => Ok(Self::Vertical),
            3 => Ok(Self::HorizontalAndVertical),
            other => Err(Error::config(format!(
                "plane detection index {other} out of range 0..=3"
            ))),
        }
    }
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Options for the native AR view, fixed at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Show the animated coaching guide until tracking starts.
    pub show_animated_guide: bool,

    /// Render detected feature points.
    pub show_feature_points: bool,

    /// Surfaces to detect.
    pub plane_detection_config: PlaneDetectionConfig,

    /// Render detected planes.
    pub show_planes: bool,

    /// Texture asset used when rendering planes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_plane_texture_path: Option<String>,

    /// Render the world origin axes.
    pub show_world_origin: bool,

    /// Report taps as `onPlaneOrPointTap` events.
    pub handle_taps: bool,

    /// Enable pan gestures on placed objects.
    pub handle_pans: bool,

    /// Enable rotation gestures on placed objects.
    pub handle_rotation: bool,
}

impl SessionConfig {
    /// Creates a configuration with every option off.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            show_animated_guide: false,
            show_feature_points: false,
            plane_detection_config: PlaneDetectionConfig::None,
            show_planes: false,
            custom_plane_texture_path: None,
            show_world_origin: false,
            handle_taps: false,
            handle_pans: false,
            handle_rotation: false,
        }
    }

    /// Enables the animated guide.
    #[inline]
    #[must_use]
    pub fn with_animated_guide(mut self) -> Self {
        self.show_animated_guide = true;
        self
    }

    /// Enables feature point rendering.
    #[inline]
    #[must_use]
    pub fn with_feature_points(mut self) -> Self {
        self.show_feature_points = true;
        self
    }

    /// Sets the plane detection mode.
    #[inline]
    #[must_use]
    pub fn with_plane_detection(mut self, config: PlaneDetectionConfig) -> Self {
        self.plane_detection_config = config;
        self
    }

    /// Enables plane rendering.
    #[inline]
    #[must_use]
    pub fn with_planes(mut self) -> Self {
        self.show_planes = true;
        self
    }

    /// Sets a custom plane texture.
    #[inline]
    #[must_use]
    pub fn with_plane_texture(mut self, path: impl Into<String>) -> Self {
        self.custom_plane_texture_path = Some(path.into());
        self
    }

    /// Enables world origin rendering.
    #[inline]
    #[must_use]
    pub fn with_world_origin(mut self) -> Self {
        self.show_world_origin = true;
        self
    }

    /// Enables tap reporting.
    #[inline]
    #[must_use]
    pub fn with_taps(mut self) -> Self {
        self.handle_taps = true;
        self
    }

    /// Enables pan gestures.
    #[inline]
    #[must_use]
    pub fn with_pans(mut self) -> Self {
        self.handle_pans = true;
        self
    }

    /// Enables rotation gestures.
    #[inline]
    #[must_use]
    pub fn with_rotation(mut self) -> Self {
        self.handle_rotation = true;
        self
    }

    /// Checks the configuration before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the custom texture path is empty.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.custom_plane_texture_path.as_deref(), Some("")) {
            return Err(Error::config("custom plane texture path is empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

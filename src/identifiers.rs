//! Type-safe identifiers for sessions, requests and tracking handles.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`SessionId`] | `NonZeroU32` | One per AR view; scopes the channel name |
//! | [`RequestId`] | `Uuid` | Request/response correlation |
//! | [`LogoIndex`] | `i64` | Logo tracking handle (`-1` = not enabled) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of every session channel name.
pub const CHANNEL_PREFIX: &str = "ar_session_";

/// Process-wide counter for [`SessionId::next`].
static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

// ============================================================================
// SessionId
// ============================================================================

/// Identifier of one AR session (one native AR view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(NonZeroU32);

impl SessionId {
    /// Creates a session ID from a raw value. Returns `None` for zero.
    #[inline]
    #[must_use]
    pub fn from_u32(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Allocates the next unused session ID in this process.
    #[must_use]
    pub fn next() -> Self {
        loop {
            let raw = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = NonZeroU32::new(raw) {
                return Self(id);
            }
        }
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0.get()
    }

    /// Returns the channel name scoped to this session.
    ///
    /// Format: `ar_session_{id}`
    #[inline]
    #[must_use]
    pub fn channel_name(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.0)
    }

    /// Parses a channel name back into its session ID.
    #[must_use]
    pub fn from_channel_name(name: &str) -> Option<Self> {
        name.strip_prefix(CHANNEL_PREFIX)?
            .parse::<u32>()
            .ok()
            .and_then(Self::from_u32)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Identifier correlating a request with its response.
///
/// The nil UUID is reserved for the READY handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the reserved READY handshake ID.
    #[inline]
    #[must_use]
    pub const fn ready() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this is the READY handshake ID.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// LogoIndex
// ============================================================================

/// Handle returned by `enableLogoTracking`.
///
/// The native layer answers `-1` when logo tracking is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogoIndex(i64);

impl LogoIndex {
    /// Sentinel for "not enabled".
    pub const UNSET: Self = Self(-1);

    /// Wraps a raw index as returned by the native layer.
    #[inline]
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns `true` if the index refers to an enabled tracker.
    #[inline]
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0 >= 0
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Default for LogoIndex {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for LogoIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

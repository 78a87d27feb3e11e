//! Anchor handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::transform::Transform;

// ============================================================================
// Anchor
// ============================================================================

/// Lightweight handle to an anchor tracked by the native layer.
///
/// The native layer owns the authoritative anchor state. The handle carries
/// the name and, optionally, the last transform the caller saw. Name
/// uniqueness is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    /// Native anchor name.
    pub name: String,

    /// Last known transform, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl Anchor {
    /// Creates a handle with no cached transform.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: None,
        }
    }

    /// Attaches a cached transform.
    #[inline]
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Returns the name, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is empty.
    pub fn require_name(&self) -> Result<&str> {
        if self.name.is_empty() {
            return Err(Error::invalid_argument("anchor name must not be empty"));
        }
        Ok(&self.name)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_name() {
        assert_eq!(Anchor::new("table").require_name().expect("named"), "table");
        assert!(matches!(
            Anchor::new("").require_name(),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_serializes_camel_case_without_transform() {
        let json = serde_json::to_string(&Anchor::new("a1")).expect("serialize");
        assert_eq!(json, r#"{"name":"a1"}"#);
    }
}

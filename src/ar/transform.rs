//! Pose transforms and their wire codec.
//!
//! Native layers send poses as 16 numbers in **column-major** order, the
//! layout of ARKit's `simd_float4x4` and ARCore's `Pose.toMatrix`:
//!
//! ```text
//! [ m00 m10 m20 m30 | m01 m11 m21 m31 | m02 m12 m22 m32 | tx ty tz 1 ]
//! ```
//!
//! Elements 12..15 carry the translation. Encoding and decoding copy elements
//! verbatim, so `decode(encode(t)) == t` bit for bit.

// ============================================================================
// Imports
// ============================================================================

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Number of elements in an encoded transform.
pub const TRANSFORM_LEN: usize = 16;

/// Squared norm below which a quaternion payload is treated as degenerate.
const MIN_QUATERNION_NORM_SQUARED: f64 = 1e-12;

// ============================================================================
// Transform
// ============================================================================

/// A 4x4 pose in the session's world coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Transform(Matrix4<f64>);

impl Transform {
    /// Decodes a column-major 16-element sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the length is not 16 or any element is
    /// NaN or infinite.
    pub fn decode(elements: &[f64]) -> Result<Self> {
        if elements.len() != TRANSFORM_LEN {
            return Err(Error::decode(format!(
                "transform needs {TRANSFORM_LEN} elements, got {}",
                elements.len()
            )));
        }

        if let Some(position) = elements.iter().position(|v| !v.is_finite()) {
            return Err(Error::decode(format!(
                "transform element {position} is not finite"
            )));
        }

        Ok(Self(Matrix4::from_column_slice(elements)))
    }

    /// Decodes a JSON payload.
    ///
    /// `null` is absence, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for non-array payloads, non-numeric items, or
    /// anything [`Transform::decode`] rejects.
    pub fn from_value(value: &Value) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }

        let elements = numbers(value, "transform")?;
        Self::decode(&elements).map(Some)
    }

    /// Encodes into a column-major 16-element array.
    #[must_use]
    pub fn encode(&self) -> [f64; TRANSFORM_LEN] {
        let mut out = [0.0; TRANSFORM_LEN];
        out.copy_from_slice(self.0.as_slice());
        out
    }

    /// Builds a rigid transform from a translation and a rotation.
    #[must_use]
    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self(Isometry3::from_parts(Translation3::from(translation), rotation).to_homogeneous())
    }

    /// Returns the translation component.
    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.0[(0, 3)], self.0[(1, 3)], self.0[(2, 3)])
    }

    /// Returns the rotation component.
    ///
    /// Any scale or shear in the upper 3x3 block is projected out.
    #[must_use]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let block: Matrix3<f64> = self.0.fixed_view::<3, 3>(0, 0).into_owned();
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&block))
    }

    /// Returns the Euclidean distance between the two translations.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Transform) -> f64 {
        (self.translation() - other.translation()).norm()
    }

    /// Returns the underlying matrix.
    #[inline]
    #[must_use]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for Transform {
    type Error = Error;

    fn try_from(elements: Vec<f64>) -> Result<Self> {
        Self::decode(&elements)
    }
}

impl From<Transform> for Vec<f64> {
    fn from(transform: Transform) -> Self {
        transform.encode().to_vec()
    }
}

// ============================================================================
// Vector Payloads
// ============================================================================

/// Decodes an `[x, y, z, w]` quaternion payload.
///
/// `null` is absence. The quaternion is normalized.
///
/// # Errors
///
/// Returns [`Error::Decode`] for the wrong length, non-finite values, or a
/// zero-length quaternion.
pub fn decode_quaternion(value: &Value) -> Result<Option<UnitQuaternion<f64>>> {
    if value.is_null() {
        return Ok(None);
    }

    let [x, y, z, w] = fixed::<4>(value, "quaternion")?;
    let quaternion = Quaternion::new(w, x, y, z);
    if quaternion.norm_squared() < MIN_QUATERNION_NORM_SQUARED {
        return Err(Error::decode("quaternion has zero length"));
    }

    Ok(Some(UnitQuaternion::from_quaternion(quaternion)))
}

/// Decodes an `[x, y, z]` payload.
///
/// `null` is absence.
///
/// # Errors
///
/// Returns [`Error::Decode`] for the wrong length or non-finite values.
pub fn decode_vector3(value: &Value) -> Result<Option<Vector3<f64>>> {
    if value.is_null() {
        return Ok(None);
    }

    let [x, y, z] = fixed::<3>(value, "vector")?;
    Ok(Some(Vector3::new(x, y, z)))
}

/// Reads a JSON array of numbers.
fn numbers(value: &Value, what: &str) -> Result<Vec<f64>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::decode(format!("{what} payload is not an array")))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_f64()
                .ok_or_else(|| Error::decode(format!("{what} element {i} is not a number")))
        })
        .collect()
}

/// Reads a JSON array of exactly `N` finite numbers.
fn fixed<const N: usize>(value: &Value, what: &str) -> Result<[f64; N]> {
    let elements = numbers(value, what)?;
    let array: [f64; N] = elements.try_into().map_err(|v: Vec<f64>| {
        Error::decode(format!("{what} needs {N} elements, got {}", v.len()))
    })?;

    if array.iter().any(|v| !v.is_finite()) {
        return Err(Error::decode(format!("{what} contains non-finite values")));
    }

    Ok(array)
}

// ============================================================================
// Tests
// ============================================================================

//! Ray representation for 3D ray tracing.
//!
//! A ray is defined as r(t) = origin + t * direction. The direction is always
//! unit length so that `t` is a world-space distance, which the depth buffer
//! and the `MIN_T` epsilon rely on.

use glam::Vec3A;

/// Ray in 3D space defined by origin and unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Starting point of the ray in world coordinates.
    pub origin: Vec3A,

    /// Unit direction vector of the ray.
    pub direction: Vec3A,
}

impl Ray {
    /// Create a new ray, normalizing `direction`.
    ///
    /// A zero-length direction yields a zero direction rather than NaNs; such a
    /// ray never intersects anything.
    pub fn new(origin: Vec3A, direction: Vec3A) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Compute a point at parameter t along the ray.
    ///
    /// Returns r(t) = origin + t * direction.
    pub fn at(&self, t: f32) -> Vec3A {
        self.origin + t * self.direction
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Vec3A::ZERO,
            direction: Vec3A::Z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_direction() {
        let r = Ray::new(Vec3A::ZERO, Vec3A::new(3.0, 0.0, 4.0));
        assert!((r.direction.length() - 1.0).abs() < 1e-6);
        assert!((r.at(5.0) - Vec3A::new(3.0, 0.0, 4.0)).length() < 1e-5);
    }

    #[test]
    fn zero_direction_stays_finite() {
        let r = Ray::new(Vec3A::ONE, Vec3A::ZERO);
        assert_eq!(r.direction, Vec3A::ZERO);
        assert!(r.at(10.0).is_finite());
    }
}

//! Ray-object intersection system.
//!
//! Defines the Hittable trait for geometric primitives and HitRecord for the
//! shading data the integrator needs at the nearest intersection.

use glam::Vec3A;

use crate::interval::Interval;
use crate::ray::Ray;

/// Smallest accepted hit distance. Also the threshold below which a metal
/// reflection is considered to point into the surface.
pub const MIN_T: f32 = 0.001;

/// Ray-object intersection information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Point where the ray intersects the object
    pub p: Vec3A,
    /// Surface normal at the intersection point, always facing the incoming ray
    pub normal: Vec3A,
    /// Distance along the ray to the intersection point
    pub t: f32,
    /// True if ray hits the front face, false if hits the back face
    pub front_face: bool,
    /// Index of the primitive in its packed array
    pub index: usize,
}

impl HitRecord {
    /// Build a record from the hit distance and the geometric outward normal.
    pub fn new(r: &Ray, t: f32, outward_normal: Vec3A, index: usize) -> Self {
        let mut rec = Self {
            p: r.at(t),
            normal: outward_normal,
            t,
            front_face: true,
            index,
        };
        rec.set_face_normal(r, outward_normal);
        rec
    }

    /// Set surface normal and determine front/back face.
    ///
    /// Ensures normal always points against the incident ray.
    pub fn set_face_normal(&mut self, r: &Ray, outward_normal: Vec3A) {
        self.front_face = r.direction.dot(outward_normal) < 0.0;
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }
}

/// Trait for primitives that can be intersected by rays.
///
/// Implementors report only the hit distance; building the full
/// [`HitRecord`] is deferred until the nearest hit is known. Must be
/// thread-safe since every pixel of a stage reads the same packed arrays.
pub trait Hittable: Sync + Send {
    /// Nearest hit distance strictly inside `ray_t`, if any.
    fn hit(&self, r: &Ray, ray_t: Interval) -> Option<f32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_faces_incoming_ray() {
        let r = Ray::new(Vec3A::ZERO, Vec3A::Z);
        let front = HitRecord::new(&r, 1.0, -Vec3A::Z, 3);
        assert!(front.front_face);
        assert_eq!(front.normal, -Vec3A::Z);

        let back = HitRecord::new(&r, 1.0, Vec3A::Z, 3);
        assert!(!back.front_face);
        assert_eq!(back.normal, -Vec3A::Z);
        assert_eq!(back.p, Vec3A::Z);
    }
}

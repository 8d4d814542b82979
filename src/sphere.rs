//! Sphere primitive for ray tracing.
//!
//! [`Sphere`] is the host-side record handed to the scene packer;
//! [`DeviceSphere`] is its flat, `Pod` counterpart living in the packed
//! snapshot and read by every pixel.

use bytemuck::{Pod, Zeroable};
use glam::Vec3A;

use crate::hittable::{HitRecord, Hittable};
use crate::interval::Interval;
use crate::ray::Ray;

/// Sphere defined by center, radius and an index into the material array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center point of the sphere in world coordinates.
    pub center: Vec3A,
    /// Radius of the sphere (always non-negative).
    pub radius: f32,
    /// Cached `radius * radius`.
    pub radius_squared: f32,
    /// Index into the packed material array.
    pub material_index: usize,
}

impl Sphere {
    /// Create a new sphere.
    ///
    /// Negative radius values are clamped to 0.0.
    pub fn new(center: Vec3A, radius: f32, material_index: usize) -> Self {
        let radius = radius.max(0.0);
        Self {
            center,
            radius,
            radius_squared: radius * radius,
            material_index,
        }
    }
}

/// Packed sphere layout.
///
/// Padded to 32 bytes so the array can be uploaded unchanged as a std430
/// storage buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DeviceSphere {
    /// Sphere center.
    pub center: [f32; 3],
    /// Sphere radius.
    pub radius: f32,
    /// Cached squared radius.
    pub radius_squared: f32,
    /// Index into the packed material array.
    pub material_index: u32,
    /// Explicit padding to keep 16-byte alignment.
    pub padding: [u32; 2],
}

impl DeviceSphere {
    /// Center as a SIMD vector.
    #[inline]
    pub fn center(&self) -> Vec3A {
        Vec3A::from_array(self.center)
    }

    /// Outward unit normal at a point on the surface.
    #[inline]
    pub fn outward_normal(&self, p: Vec3A) -> Vec3A {
        if self.radius > 0.0 {
            (p - self.center()) / self.radius
        } else {
            Vec3A::Y
        }
    }
}

impl From<&Sphere> for DeviceSphere {
    fn from(sphere: &Sphere) -> Self {
        Self {
            center: sphere.center.to_array(),
            radius: sphere.radius,
            radius_squared: sphere.radius_squared,
            material_index: sphere.material_index as u32,
            padding: [0; 2],
        }
    }
}

impl Hittable for DeviceSphere {
    fn hit(&self, r: &Ray, ray_t: Interval) -> Option<f32> {
        // Direction is unit length, so the quadratic is t^2 + 2bt + c = 0
        let oc = r.origin - self.center();
        let b = oc.dot(r.direction);
        let c = oc.length_squared() - self.radius_squared;

        let discriminant = b * b - c;
        if discriminant <= 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();
        let near = -b - sqrtd;
        if ray_t.surrounds(near) {
            return Some(near);
        }
        let far = -b + sqrtd;
        ray_t.surrounds(far).then_some(far)
    }
}

/// Find the globally nearest sphere hit in `ray_t`.
///
/// Slot 0 is the reserved dummy sphere and is never tested. Ties keep the
/// first sphere found at the minimal distance.
pub fn nearest_sphere(spheres: &[DeviceSphere], r: &Ray, ray_t: Interval) -> Option<HitRecord> {
    let mut closest: Option<(usize, f32)> = None;
    let mut window = ray_t;

    for (index, sphere) in spheres.iter().enumerate().skip(1) {
        if let Some(t) = sphere.hit(r, window) {
            closest = Some((index, t));
            window = window.with_max(t);
        }
    }

    closest.map(|(index, t)| {
        let sphere = &spheres[index];
        HitRecord::new(r, t, sphere.outward_normal(r.at(t)), index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::MIN_T;

    fn scene() -> Vec<DeviceSphere> {
        vec![
            DeviceSphere::zeroed(),
            DeviceSphere::from(&Sphere::new(Vec3A::new(0.0, 0.0, -5.0), 1.0, 1)),
            DeviceSphere::from(&Sphere::new(Vec3A::new(0.0, 0.0, -10.0), 2.0, 2)),
        ]
    }

    #[test]
    fn radius_squared_is_cached() {
        for radius in [0.5_f32, 1.0, 3.25, 1000.0] {
            let s = Sphere::new(Vec3A::ZERO, radius, 0);
            assert_eq!(s.radius_squared, radius * radius);
            assert_eq!(DeviceSphere::from(&s).radius_squared, radius * radius);
        }
        assert_eq!(Sphere::new(Vec3A::ZERO, -2.0, 0).radius, 0.0);
    }

    #[test]
    fn device_sphere_is_32_bytes() {
        assert_eq!(std::mem::size_of::<DeviceSphere>(), 32);
    }

    #[test]
    fn nearest_hit_wins() {
        let spheres = scene();
        let r = Ray::new(Vec3A::ZERO, -Vec3A::Z);
        let hit = nearest_sphere(&spheres, &r, Interval::beyond(MIN_T)).unwrap();
        assert_eq!(hit.index, 1);
        assert!((hit.t - 4.0).abs() < 1e-5);
        assert!((hit.normal - Vec3A::Z).length() < 1e-5);
        assert!(hit.front_face);
    }

    #[test]
    fn inside_hit_uses_far_root() {
        let spheres = scene();
        let r = Ray::new(Vec3A::new(0.0, 0.0, -5.0), Vec3A::X);
        let hit = nearest_sphere(&spheres, &r, Interval::beyond(MIN_T)).unwrap();
        assert_eq!(hit.index, 1);
        assert!((hit.t - 1.0).abs() < 1e-5);
        assert!(!hit.front_face);
    }

    #[test]
    fn miss_and_reserved_slot() {
        let spheres = scene();
        let r = Ray::new(Vec3A::ZERO, Vec3A::Y);
        assert!(nearest_sphere(&spheres, &r, Interval::beyond(MIN_T)).is_none());

        // A ray through the origin grazes the zero-radius dummy, which is skipped
        let through_origin = Ray::new(Vec3A::new(0.0, 5.0, 0.0), -Vec3A::Y);
        assert!(nearest_sphere(&spheres[..1], &through_origin, Interval::beyond(MIN_T)).is_none());
    }

    #[test]
    fn tangent_ray_is_a_miss() {
        let sphere = DeviceSphere::from(&Sphere::new(Vec3A::ZERO, 1.0, 1));
        let r = Ray::new(Vec3A::new(-5.0, 1.0, 0.0), Vec3A::X);
        assert!(sphere.hit(&r, Interval::beyond(MIN_T)).is_none());
    }
}

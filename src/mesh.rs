//! Triangle meshes and bounding boxes.
//!
//! Meshes are flattened into the packed scene (vertex, UV and index arrays
//! plus a [`DeviceMesh`] header per mesh) but the live trace path only
//! intersects spheres. The triangle and box tests here back the mesh loader's
//! bounds and are ready for a mesh-aware trace.

use bytemuck::{Pod, Zeroable};
use glam::Vec3A;

use crate::hittable::Hittable;
use crate::interval::Interval;
use crate::ray::Ray;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3A,
    /// Maximum corner.
    pub max: Vec3A,
}

impl Aabb {
    /// Box with inverted bounds that any point will expand.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3A::INFINITY,
        max: Vec3A::NEG_INFINITY,
    };

    /// Smallest box containing every `xyz` triple of `vertices`, offset by
    /// `origin`. An empty vertex list gives a degenerate box at `origin`.
    pub fn from_vertices(vertices: &[f32], origin: Vec3A) -> Self {
        let bounds = vertices
            .chunks_exact(3)
            .map(|v| Vec3A::new(v[0], v[1], v[2]) + origin)
            .fold(Aabb::EMPTY, |b, p| Aabb {
                min: b.min.min(p),
                max: b.max.max(p),
            });
        if bounds.min.x > bounds.max.x {
            Aabb {
                min: origin,
                max: origin,
            }
        } else {
            bounds
        }
    }

    /// Same box translated.
    pub fn offset(&self, by: Vec3A) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }
}

impl Hittable for Aabb {
    /// Slab test; returns the entry distance (or exit distance from inside).
    fn hit(&self, r: &Ray, ray_t: Interval) -> Option<f32> {
        let inv = r.direction.recip();
        let t0 = (self.min - r.origin) * inv;
        let t1 = (self.max - r.origin) * inv;
        let near = t0.min(t1).max_element().max(ray_t.min);
        let far = t0.max(t1).min_element().min(ray_t.max);
        if near > far {
            return None;
        }
        if ray_t.surrounds(near) {
            Some(near)
        } else {
            ray_t.surrounds(far).then_some(far)
        }
    }
}

/// Triangle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub v0: Vec3A,
    /// Second vertex.
    pub v1: Vec3A,
    /// Third vertex.
    pub v2: Vec3A,
}

impl Triangle {
    /// Geometric normal (counter-clockwise winding).
    pub fn normal(&self) -> Vec3A {
        (self.v1 - self.v0).cross(self.v2 - self.v0).normalize_or_zero()
    }
}

impl Hittable for Triangle {
    /// Möller–Trumbore, two-sided.
    fn hit(&self, r: &Ray, ray_t: Interval) -> Option<f32> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let p = r.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < 1e-8 {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = r.origin - self.v0;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = r.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        ray_t.surrounds(t).then_some(t)
    }
}

/// Mesh as produced by the loader, before packing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostMesh {
    /// Flat `xyz` positions.
    pub vertices: Vec<f32>,
    /// Flat `uv` coordinates, possibly empty.
    pub uvs: Vec<f32>,
    /// Vertex indices, three per triangle.
    pub triangles: Vec<u32>,
    /// Bounds in mesh space.
    pub bounds: Option<Aabb>,
}

impl HostMesh {
    /// Number of complete triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Bounds, computing them from the vertices when the loader did not.
    pub fn bounds(&self) -> Aabb {
        self.bounds
            .unwrap_or_else(|| Aabb::from_vertices(&self.vertices, Vec3A::ZERO))
    }
}

/// Packed mesh header. Offsets index the flat arrays of the snapshot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DeviceMesh {
    /// World bounds minimum.
    pub bounds_min: [f32; 3],
    /// Start of this mesh's positions, in floats.
    pub vertex_offset: u32,
    /// World bounds maximum.
    pub bounds_max: [f32; 3],
    /// Start of this mesh's UVs, in floats.
    pub uv_offset: u32,
    /// Translation applied to every vertex.
    pub origin: [f32; 3],
    /// Start of this mesh's indices.
    pub triangle_offset: u32,
    /// Number of triangles.
    pub triangle_count: u32,
    /// Index into the packed material array.
    pub material_index: u32,
    /// Padding to a 16-byte multiple.
    pub padding: [u32; 2],
}

impl DeviceMesh {
    /// World-space bounds.
    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: Vec3A::from_array(self.bounds_min),
            max: Vec3A::from_array(self.bounds_max),
        }
    }

    /// Fetch triangle `index` of this mesh from the flat arrays.
    ///
    /// Indices are relative to the mesh's own vertex block.
    pub fn triangle(&self, index: usize, vertices: &[f32], triangles: &[u32]) -> Option<Triangle> {
        if index >= self.triangle_count as usize {
            return None;
        }
        let base = self.triangle_offset as usize + index * 3;
        let corners = triangles.get(base..base + 3)?;
        let origin = Vec3A::from_array(self.origin);
        let vertex = |i: u32| -> Option<Vec3A> {
            let start = self.vertex_offset as usize + i as usize * 3;
            let v = vertices.get(start..start + 3)?;
            Some(Vec3A::new(v[0], v[1], v[2]) + origin)
        };
        Some(Triangle {
            v0: vertex(corners[0])?,
            v1: vertex(corners[1])?,
            v2: vertex(corners[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::MIN_T;

    fn unit_triangle() -> Triangle {
        Triangle {
            v0: Vec3A::new(0.0, 0.0, -2.0),
            v1: Vec3A::new(1.0, 0.0, -2.0),
            v2: Vec3A::new(0.0, 1.0, -2.0),
        }
    }

    #[test]
    fn triangle_hit_and_miss() {
        let tri = unit_triangle();
        let hit = Ray::new(Vec3A::new(0.25, 0.25, 0.0), -Vec3A::Z);
        let t = tri.hit(&hit, Interval::beyond(MIN_T)).unwrap();
        assert!((t - 2.0).abs() < 1e-5);

        let outside = Ray::new(Vec3A::new(0.75, 0.75, 0.0), -Vec3A::Z);
        assert!(tri.hit(&outside, Interval::beyond(MIN_T)).is_none());

        let parallel = Ray::new(Vec3A::new(0.25, 0.25, -2.0), Vec3A::X);
        assert!(tri.hit(&parallel, Interval::beyond(MIN_T)).is_none());

        assert!((tri.normal() - Vec3A::Z).length() < 1e-6);
    }

    #[test]
    fn aabb_slab_test() {
        let b = Aabb {
            min: Vec3A::splat(-1.0),
            max: Vec3A::splat(1.0),
        };
        let r = Ray::new(Vec3A::new(0.0, 0.0, 5.0), -Vec3A::Z);
        assert!((b.hit(&r, Interval::beyond(MIN_T)).unwrap() - 4.0).abs() < 1e-5);

        let inside = Ray::new(Vec3A::ZERO, Vec3A::X);
        assert!((b.hit(&inside, Interval::beyond(MIN_T)).unwrap() - 1.0).abs() < 1e-5);

        let miss = Ray::new(Vec3A::new(0.0, 3.0, 5.0), -Vec3A::Z);
        assert!(b.hit(&miss, Interval::beyond(MIN_T)).is_none());
    }

    #[test]
    fn bounds_from_vertices() {
        let verts = [0.0, 0.0, 0.0, 1.0, -2.0, 3.0, -1.0, 4.0, 0.5];
        let b = Aabb::from_vertices(&verts, Vec3A::new(10.0, 0.0, 0.0));
        assert_eq!(b.min, Vec3A::new(9.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3A::new(11.0, 4.0, 3.0));

        let empty = Aabb::from_vertices(&[], Vec3A::ONE);
        assert_eq!(empty.min, Vec3A::ONE);
    }

    #[test]
    fn device_mesh_fetches_triangles() {
        let vertices = [
            9.0, 9.0, 9.0, // another mesh's vertex
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
        ];
        let triangles = [0, 0, 0, 0, 1, 2];
        let mesh = DeviceMesh {
            vertex_offset: 3,
            triangle_offset: 3,
            triangle_count: 1,
            origin: [0.0, 0.0, -2.0],
            ..Default::default()
        };
        let tri = mesh.triangle(0, &vertices, &triangles).unwrap();
        assert_eq!(tri, unit_triangle());
        assert!(mesh.triangle(1, &vertices, &triangles).is_none());
        assert_eq!(std::mem::size_of::<DeviceMesh>(), 64);
    }
}

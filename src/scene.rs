//! Device scene packer.
//!
//! Host-side scene collections are kept as flat arrays of packed records,
//! indexed by integer ids handed out by the `add_*` calls. The renderer reads
//! an immutable [`RenderData`] snapshot of them; the snapshot is rebuilt
//! wholesale, at most once per [`ScenePacker::packed_scene`] call, whenever
//! anything was added since the last build.
//!
//! Slot 0 of every array is a zeroed dummy so an empty scene still produces
//! valid, non-empty buffers.

use std::sync::Arc;

use bytemuck::Zeroable;
use glam::Vec3A;
use log::debug;

use crate::error::{RenderError, Result};
use crate::material::{DeviceMaterial, MaterialData, MaterialKind};
use crate::mesh::{DeviceMesh, HostMesh};
use crate::sphere::{DeviceSphere, Sphere};

/// Immutable packed scene, shared by every pixel of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderData {
    /// Materials; slot 0 is a zeroed diffuse.
    pub materials: Vec<DeviceMaterial>,
    /// Spheres; slot 0 is a zero-radius dummy never intersected.
    pub spheres: Vec<DeviceSphere>,
    /// Indices into `spheres` whose material is a light; slot 0 is reserved.
    pub light_sphere_ids: Vec<u32>,
    /// Mesh headers; slot 0 is reserved.
    pub meshes: Vec<DeviceMesh>,
    /// Flat mesh positions.
    pub vertices: Vec<f32>,
    /// Flat mesh UVs.
    pub uvs: Vec<f32>,
    /// Flat mesh indices.
    pub triangles: Vec<u32>,
}

impl RenderData {
    /// Light spheres available for sampling, excluding the reserved slot.
    #[inline]
    pub fn light_ids(&self) -> &[u32] {
        self.light_sphere_ids.get(1..).unwrap_or(&[])
    }

    /// Material of a sphere by index.
    #[inline]
    pub fn sphere_material(&self, sphere_index: usize) -> &DeviceMaterial {
        &self.materials[self.spheres[sphere_index].material_index as usize]
    }

    /// Sphere array as raw bytes, ready for a storage-buffer upload.
    pub fn sphere_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.spheres)
    }

    /// Material array as raw bytes.
    pub fn material_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.materials)
    }

    /// Mesh header array as raw bytes.
    pub fn mesh_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.meshes)
    }

    /// Total size of all packed arrays.
    pub fn byte_size(&self) -> usize {
        self.sphere_bytes().len()
            + self.material_bytes().len()
            + self.mesh_bytes().len()
            + std::mem::size_of_val(self.light_sphere_ids.as_slice())
            + std::mem::size_of_val(self.vertices.as_slice())
            + std::mem::size_of_val(self.uvs.as_slice())
            + std::mem::size_of_val(self.triangles.as_slice())
    }
}

/// Host-side scene store with dirty-flag snapshotting.
///
/// Not thread-safe: the render thread owns it and is the only caller.
#[derive(Debug)]
pub struct ScenePacker {
    host: RenderData,
    snapshot: Option<Arc<RenderData>>,
    dirty: bool,
    rebuilds: usize,
}

impl Default for ScenePacker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenePacker {
    /// Packer holding only the reserved dummy entries.
    pub fn new() -> Self {
        Self {
            host: RenderData {
                materials: vec![DeviceMaterial::zeroed()],
                spheres: vec![DeviceSphere::zeroed()],
                light_sphere_ids: vec![0],
                meshes: vec![DeviceMesh::zeroed()],
                vertices: vec![0.0; 3],
                uvs: vec![0.0; 2],
                triangles: vec![0; 3],
            },
            snapshot: None,
            dirty: true,
            rebuilds: 0,
        }
    }

    /// Register a material and return its id.
    pub fn add_material(&mut self, material: MaterialData) -> usize {
        let id = self.host.materials.len();
        self.host.materials.push(material.to_device());
        self.dirty = true;
        id
    }

    /// Register a sphere and return its id.
    ///
    /// Spheres with a Light material are also added to the light list.
    pub fn add_sphere(&mut self, sphere: Sphere) -> Result<usize> {
        let is_light = self.material(sphere.material_index)?.kind() == MaterialKind::Light;
        let id = self.host.spheres.len();
        self.host.spheres.push(DeviceSphere::from(&sphere));
        if is_light {
            self.host.light_sphere_ids.push(id as u32);
        }
        self.dirty = true;
        Ok(id)
    }

    /// Flatten a mesh into the shared vertex/UV/index arrays and return its id.
    pub fn add_mesh(&mut self, mesh: &HostMesh, origin: Vec3A, material_index: usize) -> Result<usize> {
        self.material(material_index)?;

        let bounds = mesh.bounds().offset(origin);
        let header = DeviceMesh {
            bounds_min: bounds.min.to_array(),
            vertex_offset: self.host.vertices.len() as u32,
            bounds_max: bounds.max.to_array(),
            uv_offset: self.host.uvs.len() as u32,
            origin: origin.to_array(),
            triangle_offset: self.host.triangles.len() as u32,
            triangle_count: mesh.triangle_count() as u32,
            material_index: material_index as u32,
            padding: [0; 2],
        };

        self.host.vertices.extend_from_slice(&mesh.vertices);
        self.host.uvs.extend_from_slice(&mesh.uvs);
        self.host.triangles.extend_from_slice(&mesh.triangles);

        let id = self.host.meshes.len();
        self.host.meshes.push(header);
        self.dirty = true;
        Ok(id)
    }

    /// Current packed snapshot, rebuilding it first if anything changed.
    ///
    /// Calling this twice without an `add_*` in between returns the same
    /// `Arc`.
    pub fn packed_scene(&mut self) -> Arc<RenderData> {
        if !self.dirty {
            if let Some(snapshot) = &self.snapshot {
                return Arc::clone(snapshot);
            }
        }

        // Release the previous version before building the next one
        self.snapshot = None;
        let snapshot = Arc::new(self.host.clone());
        self.rebuilds += 1;
        self.dirty = false;
        debug!(
            "Rebuilt packed scene #{}: {} spheres, {} lights, {} materials, {} meshes ({} bytes)",
            self.rebuilds,
            snapshot.spheres.len() - 1,
            snapshot.light_ids().len(),
            snapshot.materials.len() - 1,
            snapshot.meshes.len() - 1,
            snapshot.byte_size()
        );
        self.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Whether the next snapshot access will rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of snapshot builds so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Host material array, including the reserved slot.
    pub fn materials(&self) -> &[DeviceMaterial] {
        &self.host.materials
    }

    /// Host sphere array, including the reserved slot.
    pub fn spheres(&self) -> &[DeviceSphere] {
        &self.host.spheres
    }

    /// Host light list, including the reserved slot.
    pub fn light_sphere_ids(&self) -> &[u32] {
        &self.host.light_sphere_ids
    }

    /// Host mesh headers, including the reserved slot.
    pub fn meshes(&self) -> &[DeviceMesh] {
        &self.host.meshes
    }

    fn material(&self, index: usize) -> Result<&DeviceMaterial> {
        self.host
            .materials
            .get(index)
            .ok_or(RenderError::InvalidMaterialIndex {
                index,
                count: self.host.materials.len(),
            })
    }
}

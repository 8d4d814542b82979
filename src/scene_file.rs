//! Scene persistence.
//!
//! A scene on disk is a camera plus a list of spheres, each with its own
//! material, and optionally OBJ meshes. Loading a path that does not exist
//! yields the built-in debug scene, which is then saved back on shutdown.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use glam::Vec3A;
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::camera::CameraSettings;
use crate::error::Result;
use crate::material::MaterialData;
use crate::obj::load_obj;
use crate::scene::ScenePacker;
use crate::sphere::Sphere;

/// A sphere together with its material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Sphere center.
    pub center: Vec3A,
    /// Sphere radius.
    pub radius: f32,
    /// Surface material.
    pub material: MaterialData,
}

/// An OBJ mesh placed in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshObject {
    /// Path of the OBJ file.
    pub path: PathBuf,
    /// Translation applied to every vertex.
    #[serde(default)]
    pub origin: Vec3A,
    /// Surface material.
    pub material: MaterialData,
}

/// Everything needed to start rendering, and what is handed back at shutdown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Main camera.
    #[serde(default)]
    pub camera: CameraSettings,
    /// Spheres in insertion order.
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    /// Meshes in insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<MeshObject>,
}

impl SceneDescription {
    /// Empty scene viewed through `camera`.
    pub fn new(camera: CameraSettings) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    /// Append a sphere with its own material.
    pub fn add_sphere_and_material(&mut self, center: Vec3A, radius: f32, material: MaterialData) {
        self.objects.push(SceneObject {
            center,
            radius,
            material,
        });
    }

    /// Read a scene from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Read a scene, or fall back to [`debug_scene`] if `path` does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let scene = Self::load(path)?;
            info!(
                "Loaded scene {} ({} spheres, {} meshes)",
                path.display(),
                scene.objects.len(),
                scene.meshes.len()
            );
            Ok(scene)
        } else {
            info!("Scene {} not found, using the debug scene", path.display());
            Ok(debug_scene())
        }
    }

    /// Write the scene as indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        info!("Scene saved as {}", path.as_ref().display());
        Ok(())
    }

    /// Register every material, sphere and mesh with the packer, in order.
    pub fn install(&self, packer: &mut ScenePacker) -> Result<()> {
        for object in &self.objects {
            let material = packer.add_material(object.material);
            packer.add_sphere(Sphere::new(object.center, object.radius, material))?;
        }
        for mesh in &self.meshes {
            let host = load_obj(&mesh.path)?;
            let material = packer.add_material(mesh.material);
            packer.add_mesh(&host, mesh.origin, material)?;
        }
        Ok(())
    }
}

/// Built-in test scene: three colored balls, three lights, a floor, three
/// large mirrors and fifty small random spheres.
pub fn debug_scene() -> SceneDescription {
    let mut scene = SceneDescription::new(CameraSettings {
        origin: Vec3A::new(-0.25, 1.0, 7.5),
        look_at: Vec3A::new(-0.25, 1.12, 6.5),
        ..Default::default()
    });

    let mirror = MaterialData::mirror(Vec3A::splat(0.9999));
    scene.add_sphere_and_material(Vec3A::new(0.0, 1.0, 0.0), 0.5, MaterialData::diffuse(Vec3A::new(0.9999, 0.0, 0.0)));
    scene.add_sphere_and_material(Vec3A::new(1.0, 1.0, 0.0), 0.5, MaterialData::diffuse(Vec3A::new(0.0, 0.9999, 0.0)));
    scene.add_sphere_and_material(Vec3A::new(-1.0, 1.0, 0.0), 0.5, MaterialData::diffuse(Vec3A::new(0.0, 0.0, 0.9999)));
    scene.add_sphere_and_material(Vec3A::new(0.0, 15.0, 5.0), 0.1, MaterialData::light(Vec3A::ONE));
    scene.add_sphere_and_material(Vec3A::new(-25.0, 5.0, 0.0), 1.0, MaterialData::light(Vec3A::new(0.9999, 0.1, 0.1)));
    scene.add_sphere_and_material(Vec3A::new(25.0, 5.0, 0.0), 1.0, MaterialData::light(Vec3A::new(0.1, 0.1, 0.9999)));
    scene.add_sphere_and_material(Vec3A::new(-1.0, -100_000.0, 0.0), 100_000.0, MaterialData::diffuse(Vec3A::ONE));
    scene.add_sphere_and_material(Vec3A::new(7.0, 5.0, 0.0), 5.0, mirror);
    scene.add_sphere_and_material(Vec3A::new(-7.0, 5.0, 0.0), 5.0, mirror);
    scene.add_sphere_and_material(Vec3A::new(0.0, 5.0, -7.0), 5.0, MaterialData::metal(Vec3A::splat(0.9999), 0.25));

    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let channel = |rng: &mut ChaCha20Rng| -> f32 { if rng.random_bool(0.5) { 0.1 } else { 0.9 } };
    for _ in 0..50 {
        let diffuse = rng.random_bool(0.5);
        let color = Vec3A::new(channel(&mut rng), channel(&mut rng), channel(&mut rng));
        let material = if diffuse {
            MaterialData::diffuse(color)
        } else {
            MaterialData::mirror(color)
        };
        let size = rng.random_range(0.0..2.0f32);
        let center = Vec3A::new(rng.random_range(-25..25) as f32, size, rng.random_range(5..25) as f32);
        scene.add_sphere_and_material(center, size, material);
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialKind;

    #[test]
    fn debug_scene_is_deterministic() {
        let a = debug_scene();
        let b = debug_scene();
        assert_eq!(a, b);
        assert_eq!(a.objects.len(), 60);
        let lights = a
            .objects
            .iter()
            .filter(|o| o.material.kind() == MaterialKind::Light)
            .count();
        assert_eq!(lights, 3);
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let scene = debug_scene();
        scene.save(&path).unwrap();
        let loaded = SceneDescription::load(&path).unwrap();
        assert_eq!(loaded, scene);
    }

    #[test]
    fn missing_file_falls_back_to_debug_scene() {
        let dir = tempfile::tempdir().unwrap();
        let scene = SceneDescription::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(scene, debug_scene());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ \"objects\": [ { \"center\": 1 } ] }").unwrap();
        assert!(matches!(
            SceneDescription::load(&path),
            Err(crate::error::RenderError::SceneFormat(_))
        ));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let scene: SceneDescription = serde_json::from_str(
            r#"{ "objects": [ { "center": [0, 0, 0], "radius": 1, "material": { "type": "metal", "color": [1, 1, 1] } } ] }"#,
        )
        .unwrap();
        assert_eq!(scene.camera, CameraSettings::default());
        assert_eq!(scene.objects[0].material, MaterialData::mirror(Vec3A::ONE));
    }

    #[test]
    fn install_preserves_order() {
        let scene = debug_scene();
        let mut packer = ScenePacker::new();
        scene.install(&mut packer).unwrap();
        assert_eq!(packer.spheres().len(), scene.objects.len() + 1);
        assert_eq!(packer.materials().len(), scene.objects.len() + 1);
        assert_eq!(packer.light_sphere_ids(), &[0, 4, 5, 6]);
        for (i, object) in scene.objects.iter().enumerate() {
            let packed = &packer.spheres()[i + 1];
            assert_eq!(packed.center(), object.center);
            assert_eq!(packer.materials()[packed.material_index as usize], object.material.to_device());
        }
    }
}

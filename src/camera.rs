//! Camera for ray generation.
//!
//! A [`Camera`] is an immutable value. Resizing, moving, turning and switching
//! display mode all build a new camera from the old one, so every derived
//! field (basis, aspect ratio, plane distance, reciprocals) is always
//! consistent with the settings it was built from.

use glam::{Quat, Vec3A};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::material::Color;
use crate::ray::Ray;

/// How the lighting and color buffers are composited for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Path color modulated by direct lighting.
    #[default]
    Combined,
    /// Path color only.
    GlobalIllumination,
    /// Direct lighting only.
    DirectLighting,
}

impl RenderMode {
    /// Human readable name for logs and overlays.
    pub fn describe(&self) -> &'static str {
        match self {
            RenderMode::Combined => "Combined GI + Direct Lighting",
            RenderMode::GlobalIllumination => "Global Illumination",
            RenderMode::DirectLighting => "Direct Lighting",
        }
    }
}

impl TryFrom<i32> for RenderMode {
    type Error = RenderError;

    fn try_from(mode: i32) -> Result<Self, Self::Error> {
        match mode {
            0 => Ok(RenderMode::Combined),
            1 => Ok(RenderMode::GlobalIllumination),
            2 => Ok(RenderMode::DirectLighting),
            other => Err(RenderError::InvalidMode(other)),
        }
    }
}

/// User-facing camera parameters; everything else is derived from these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Camera position.
    pub origin: Vec3A,
    /// Point the camera looks at.
    pub look_at: Vec3A,
    /// World up hint.
    pub up: Vec3A,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Vertical field of view in degrees.
    pub vertical_fov: f32,
    /// Maximum scatter iterations per pixel.
    pub max_color_bounces: u32,
    /// Shadow-ray trials per lit bounce.
    pub lights_per_sample: u32,
    /// Bounces (from the first) that sample direct lighting.
    pub light_bounces: u32,
    /// Ambient floor applied to lighting when compositing.
    pub min_light: f32,
    /// History weight of the temporal blend.
    pub taa_exponent: f32,
    /// Background color for rays that leave the scene.
    pub no_hit_color: Color,
    /// Display compositing mode.
    pub mode: RenderMode,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            origin: Vec3A::new(0.0, 0.0, 0.0),
            look_at: Vec3A::new(0.0, 0.0, -1.0),
            up: Vec3A::Y,
            width: 300,
            height: 300,
            vertical_fov: 40.0,
            max_color_bounces: 5,
            lights_per_sample: 3,
            light_bounces: 4,
            min_light: 15.0 / 255.0,
            taa_exponent: 0.9,
            no_hit_color: Vec3A::new(0.2, 0.7, 1.0),
            mode: RenderMode::Combined,
        }
    }
}

/// Right-handed orthonormal frame; `z` is the view direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoNormalBasis {
    /// Camera right (in image space, pixels grow along `-x`).
    pub x: Vec3A,
    /// Camera up.
    pub y: Vec3A,
    /// Forward.
    pub z: Vec3A,
}

impl OrthoNormalBasis {
    /// Basis from a forward vector and an up hint.
    ///
    /// Falls back to [`OrthoNormalBasis::from_z`] when `y` is (nearly)
    /// parallel to `z`.
    pub fn from_zy(z: Vec3A, y: Vec3A) -> Self {
        let cross = y.cross(z);
        if cross.length_squared() < 1e-10 {
            return Self::from_z(z);
        }
        let xx = cross.normalize();
        let yy = z.cross(xx).normalize();
        Self { x: xx, y: yy, z }
    }

    /// Basis from a forward vector alone, seeding the cross product with the
    /// X axis unless `z` is nearly parallel to it.
    pub fn from_z(z: Vec3A) -> Self {
        let seed = if z.dot(Vec3A::X).abs() > 0.99999 {
            Vec3A::Y
        } else {
            Vec3A::X
        };
        let xx = seed.cross(z).normalize();
        let yy = z.cross(xx).normalize();
        Self { x: xx, y: yy, z }
    }

    /// Express a local vector in world space.
    pub fn transform(&self, v: Vec3A) -> Vec3A {
        self.x * v.x + self.y * v.y + self.z * v.z
    }
}

/// Pinhole camera with derived projection state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    settings: CameraSettings,
    basis: OrthoNormalBasis,
    aspect_ratio: f32,
    camera_plane_dist: f32,
    reciprocal_width: f32,
    reciprocal_height: f32,
}

impl Camera {
    /// Build a camera and derive its projection state.
    pub fn new(settings: CameraSettings) -> Self {
        let forward = (settings.look_at - settings.origin)
            .try_normalize()
            .unwrap_or(-Vec3A::Z);
        let up = settings.up.try_normalize().unwrap_or(Vec3A::Y);
        let width = settings.width.max(1) as f32;
        let height = settings.height.max(1) as f32;

        Self {
            basis: OrthoNormalBasis::from_zy(forward, up),
            aspect_ratio: width / height,
            camera_plane_dist: 1.0 / (settings.vertical_fov * std::f32::consts::PI / 360.0).tan(),
            reciprocal_width: 1.0 / width,
            reciprocal_height: 1.0 / height,
            settings,
        }
    }

    /// Same camera rendering at a different resolution.
    pub fn with_resolution(&self, width: u32, height: u32) -> Self {
        Self::new(CameraSettings {
            width,
            height,
            ..self.settings
        })
    }

    /// Same camera with a different display mode.
    pub fn with_mode(&self, mode: RenderMode) -> Self {
        Self::new(CameraSettings { mode, ..self.settings })
    }

    /// Camera translated by `movement` and turned by `turn`.
    ///
    /// `turn.x` pitches about the basis right vector and `turn.y` yaws about
    /// the basis up vector, both in radians. The look-at point stays one unit
    /// in front of the origin afterwards.
    pub fn moved(&self, movement: Vec3A, turn: Vec3A) -> Self {
        let mut direction = self.basis.z;
        if turn.y != 0.0 {
            direction = Quat::from_axis_angle(self.basis.y.into(), turn.y).mul_vec3a(direction);
        }
        if turn.x != 0.0 {
            direction = Quat::from_axis_angle(self.basis.x.into(), turn.x).mul_vec3a(direction);
        }
        let direction = direction.try_normalize().unwrap_or(self.basis.z);

        let origin = self.settings.origin + movement;
        Self::new(CameraSettings {
            origin,
            look_at: origin + direction,
            ..self.settings
        })
    }

    /// Jittered pixel coordinate to world-space ray.
    pub fn get_ray(&self, x: f32, y: f32) -> Ray {
        self.ray_from_unit(
            2.0 * (x * self.reciprocal_width) - 1.0,
            2.0 * (y * self.reciprocal_height) - 1.0,
        )
    }

    fn ray_from_unit(&self, u: f32, v: f32) -> Ray {
        let local = Vec3A::new(-u * self.aspect_ratio, -v, self.camera_plane_dist);
        Ray::new(self.settings.origin, self.basis.transform(local))
    }

    /// Whether both dimensions are non-zero.
    pub fn is_renderable(&self) -> bool {
        self.settings.width > 0 && self.settings.height > 0
    }

    /// Settings this camera was built from.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Derived basis.
    pub fn basis(&self) -> &OrthoNormalBasis {
        &self.basis
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.settings.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.settings.height
    }

    /// Display mode.
    pub fn mode(&self) -> RenderMode {
        self.settings.mode
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Distance to the unit image plane, `1/tan(fov/2)`.
    pub fn camera_plane_dist(&self) -> f32 {
        self.camera_plane_dist
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_orthonormal(b: &OrthoNormalBasis) {
        for v in [b.x, b.y, b.z] {
            assert!((v.length() - 1.0).abs() < 1e-5, "{v:?}");
        }
        assert!(b.x.dot(b.y).abs() < 1e-5);
        assert!(b.y.dot(b.z).abs() < 1e-5);
        assert!(b.z.dot(b.x).abs() < 1e-5);
    }

    #[test]
    fn derived_fields() {
        let cam = Camera::new(CameraSettings {
            width: 200,
            height: 100,
            vertical_fov: 90.0,
            ..Default::default()
        });
        assert!((cam.aspect_ratio() - 2.0).abs() < 1e-6);
        assert!((cam.camera_plane_dist() - 1.0).abs() < 1e-5);
        assert_orthonormal(cam.basis());
    }

    #[test]
    fn basis_maps_local_axes_to_world() {
        let basis = OrthoNormalBasis::from_zy(Vec3A::new(1.0, 0.0, -1.0).normalize(), Vec3A::Y);
        assert_eq!(basis.transform(Vec3A::X), basis.x);
        assert_eq!(basis.transform(Vec3A::Z), basis.z);
        let v = Vec3A::new(0.3, -1.2, 2.0);
        assert!((basis.transform(v).length() - v.length()).abs() < 1e-5);
    }

    #[test]
    fn center_and_corner_rays() {
        let cam = Camera::new(CameraSettings {
            width: 100,
            height: 100,
            vertical_fov: 90.0,
            ..Default::default()
        });
        let center = cam.get_ray(50.0, 50.0);
        assert!((center.direction - -Vec3A::Z).length() < 1e-5);

        // Top of the image looks up, right of the image looks right
        let top = cam.get_ray(50.0, 0.0);
        assert!((top.direction - Vec3A::new(0.0, 1.0, -1.0).normalize()).length() < 1e-5);
        let right = cam.get_ray(100.0, 50.0);
        assert!(right.direction.x > 0.5);
    }

    #[test]
    fn rays_are_unit_length() {
        let cam = Camera::new(CameraSettings {
            width: 64,
            height: 48,
            origin: Vec3A::new(3.0, -2.0, 7.0),
            look_at: Vec3A::new(0.0, 1.0, 0.0),
            ..Default::default()
        });
        for y in 0..48 {
            for x in 0..64 {
                let r = cam.get_ray(x as f32 + 0.37, y as f32 + 0.91);
                assert!((r.direction.length() - 1.0).abs() < 1e-5);
                assert_eq!(r.origin, Vec3A::new(3.0, -2.0, 7.0));
            }
        }
    }

    #[test]
    fn degenerate_up_falls_back() {
        let basis = OrthoNormalBasis::from_zy(Vec3A::Y, Vec3A::Y);
        assert_orthonormal(&basis);
        let basis = OrthoNormalBasis::from_z(Vec3A::X);
        assert_orthonormal(&basis);
        let basis = OrthoNormalBasis::from_z(-Vec3A::X);
        assert_orthonormal(&basis);

        let cam = Camera::new(CameraSettings {
            look_at: Vec3A::new(0.0, 10.0, 0.0),
            ..Default::default()
        });
        assert!(cam.get_ray(150.0, 150.0).direction.is_finite());
    }

    #[test]
    fn moved_returns_new_value() {
        let cam = Camera::default();
        let moved = cam.moved(Vec3A::new(1.0, 0.0, 0.0), Vec3A::ZERO);
        assert_eq!(cam.settings().origin, Vec3A::ZERO);
        assert_eq!(moved.settings().origin, Vec3A::X);
        assert!((moved.basis().z - cam.basis().z).length() < 1e-6);

        let turned = cam.moved(Vec3A::ZERO, Vec3A::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        assert!(turned.basis().z.dot(cam.basis().z).abs() < 1e-5);
        assert_orthonormal(turned.basis());

        let pitched = cam.moved(Vec3A::ZERO, Vec3A::new(0.3, 0.0, 0.0));
        assert!((pitched.basis().z.dot(cam.basis().z) - 0.3f32.cos()).abs() < 1e-5);
    }

    #[test]
    fn resolution_and_mode_rebuild() {
        let cam = Camera::default().with_resolution(640, 320);
        assert_eq!(cam.width(), 640);
        assert!((cam.aspect_ratio() - 2.0).abs() < 1e-6);
        let gi = cam.with_mode(RenderMode::GlobalIllumination);
        assert_eq!(gi.mode(), RenderMode::GlobalIllumination);
        assert_eq!(gi.width(), 640);

        assert!(!Camera::default().with_resolution(0, 10).is_renderable());
        assert!(RenderMode::try_from(3).is_err());
        assert_eq!(RenderMode::try_from(2).unwrap(), RenderMode::DirectLighting);
    }
}

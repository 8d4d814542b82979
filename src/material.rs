//! Material system for path tracing.
//!
//! Four material kinds: Diffuse, Glass, Metal and Light. [`MaterialData`] is
//! the host-side description; [`DeviceMaterial`] is the flat record stored in
//! the packed scene, where the kind tag decides which fields are meaningful
//! and every other field is zero.

use bytemuck::{Pod, Zeroable};
use glam::Vec3A;
use serde::{Deserialize, Serialize};

use crate::hittable::{HitRecord, MIN_T};
use crate::random::PixelRng;
use crate::ray::Ray;

/// RGB color type using Vec3A for SIMD optimization.
pub type Color = Vec3A;

/// Discriminant stored in [`DeviceMaterial::kind`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Lambertian-style diffuse surface.
    Diffuse = 0,
    /// Dielectric with refraction and Fresnel reflection.
    Glass = 1,
    /// Specular reflector with optional fuzz cone.
    Metal = 2,
    /// Emitter; terminates paths.
    Light = 3,
}

impl MaterialKind {
    /// Decode a packed discriminant.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Diffuse),
            1 => Some(Self::Glass),
            2 => Some(Self::Metal),
            3 => Some(Self::Light),
            _ => None,
        }
    }
}

/// Host-side material description, as stored in scene files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialData {
    /// Matte surface.
    Diffuse {
        /// Surface reflectance.
        color: Color,
    },
    /// Transparent dielectric.
    Glass {
        /// Transmission tint.
        color: Color,
        /// Index of refraction (1.0 = air, 1.5 = glass).
        refractive_index: f32,
    },
    /// Mirror-like metal.
    Metal {
        /// Reflectance.
        color: Color,
        /// Reflection cone angle in radians, clamped to 1.
        #[serde(default)]
        fuzz: f32,
    },
    /// Emitter.
    Light {
        /// Emitted radiance.
        color: Color,
    },
}

impl MaterialData {
    /// Diffuse material.
    pub fn diffuse(color: Color) -> Self {
        Self::Diffuse { color }
    }

    /// Glass material.
    pub fn glass(color: Color, refractive_index: f32) -> Self {
        Self::Glass {
            color,
            refractive_index,
        }
    }

    /// Perfect mirror.
    pub fn mirror(color: Color) -> Self {
        Self::Metal { color, fuzz: 0.0 }
    }

    /// Metal with a reflection cone; `fuzz` is clamped to 1.
    pub fn metal(color: Color, fuzz: f32) -> Self {
        Self::Metal {
            color,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }

    /// Light emitter.
    pub fn light(color: Color) -> Self {
        Self::Light { color }
    }

    /// Kind tag of this material.
    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::Diffuse { .. } => MaterialKind::Diffuse,
            Self::Glass { .. } => MaterialKind::Glass,
            Self::Metal { .. } => MaterialKind::Metal,
            Self::Light { .. } => MaterialKind::Light,
        }
    }

    /// Flatten into the packed layout, zeroing fields the kind does not use.
    pub fn to_device(&self) -> DeviceMaterial {
        let mut packed = DeviceMaterial::zeroed();
        packed.kind = self.kind() as u32;
        match *self {
            Self::Diffuse { color } | Self::Light { color } => {
                packed.color = color.to_array();
            }
            Self::Glass {
                color,
                refractive_index,
            } => {
                packed.color = color.to_array();
                packed.refractive_index = refractive_index;
            }
            Self::Metal { color, fuzz } => {
                packed.color = color.to_array();
                packed.reflection_cone_angle = fuzz.clamp(0.0, 1.0);
            }
        }
        packed
    }
}

/// Packed material layout (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DeviceMaterial {
    /// Base, tint or emitted color.
    pub color: [f32; 3],
    /// [`MaterialKind`] discriminant.
    pub kind: u32,
    /// Glass only.
    pub refractive_index: f32,
    /// Reserved for metal reflectivity; kept zero.
    pub reflectivity: f32,
    /// Metal only: radius of the fuzz perturbation.
    pub reflection_cone_angle: f32,
    /// Padding to a 16-byte multiple.
    pub padding: u32,
}

/// Result of a successful scatter.
#[derive(Debug, Clone, Copy)]
pub struct Scatter {
    /// Continuation ray.
    pub ray: Ray,
    /// Color the bounce multiplies into the path.
    pub attenuation: Color,
}

impl DeviceMaterial {
    /// Decoded kind; unknown tags shade as diffuse.
    #[inline]
    pub fn kind(&self) -> MaterialKind {
        MaterialKind::from_raw(self.kind).unwrap_or(MaterialKind::Diffuse)
    }

    /// Color as a SIMD vector.
    #[inline]
    pub fn color(&self) -> Color {
        Vec3A::from_array(self.color)
    }

    /// Whether this material emits light.
    #[inline]
    pub fn is_light(&self) -> bool {
        self.kind() == MaterialKind::Light
    }

    /// Compute the continuation ray for this material.
    ///
    /// Returns `None` when the path is absorbed.
    pub fn scatter(&self, r_in: &Ray, rec: &HitRecord, rng: &mut PixelRng) -> Option<Scatter> {
        match self.kind() {
            MaterialKind::Diffuse => Some(self.scatter_diffuse(rec, rng)),
            MaterialKind::Glass => Some(self.scatter_glass(r_in, rec, rng)),
            MaterialKind::Metal => self.scatter_metal(r_in, rec, rng),
            MaterialKind::Light => Some(Scatter {
                ray: Ray::new(rec.p, rec.normal),
                attenuation: self.color(),
            }),
        }
    }

    fn scatter_diffuse(&self, rec: &HitRecord, rng: &mut PixelRng) -> Scatter {
        let mut direction = rec.normal + rng.random_unit_vector();

        // Catch degenerate scatter direction (very close to zero)
        if direction.length_squared() < 1e-8 {
            direction = rec.normal;
        }

        Scatter {
            ray: Ray::new(rec.p, direction),
            attenuation: self.color(),
        }
    }

    fn scatter_metal(&self, r_in: &Ray, rec: &HitRecord, rng: &mut PixelRng) -> Option<Scatter> {
        let mut direction = reflect(r_in.direction, rec.normal);
        if self.reflection_cone_angle > 0.0 {
            direction += self.reflection_cone_angle * rng.random_unit_vector();
        }
        let ray = Ray::new(rec.p, direction);

        (ray.direction.dot(rec.normal) > MIN_T).then(|| Scatter {
            ray,
            attenuation: self.color(),
        })
    }

    fn scatter_glass(&self, r_in: &Ray, rec: &HitRecord, rng: &mut PixelRng) -> Scatter {
        let ri = if rec.front_face {
            1.0 / self.refractive_index.max(f32::EPSILON)
        } else {
            self.refractive_index
        };

        let unit_direction = r_in.direction;
        let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);

        let direction = match refract(unit_direction, rec.normal, ri) {
            Some(refracted) if reflectance(cos_theta, ri) <= rng.next_f32() => refracted,
            // Total internal reflection, or Fresnel picked reflection
            _ => reflect(unit_direction, rec.normal),
        };

        Scatter {
            ray: Ray::new(rec.p, direction),
            attenuation: self.color(),
        }
    }
}

/// Reflect a vector off a surface using the law of reflection.
#[inline]
pub fn reflect(v: Vec3A, n: Vec3A) -> Vec3A {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through an interface using Snell's law.
///
/// Returns `None` on total internal reflection (negative discriminant).
#[inline]
pub fn refract(uv: Vec3A, n: Vec3A, etai_over_etat: f32) -> Option<Vec3A> {
    let cos_theta = (-uv).dot(n).min(1.0);
    let discriminant = 1.0 - etai_over_etat * etai_over_etat * (1.0 - cos_theta * cos_theta);
    if discriminant < 0.0 {
        return None;
    }
    Some(etai_over_etat * (uv + cos_theta * n) - discriminant.sqrt() * n)
}

/// Compute Fresnel reflectance using Schlick's approximation.
#[inline]
pub fn reflectance(cosine: f32, refraction_index: f32) -> f32 {
    let r0 = (1.0 - refraction_index) / (1.0 + refraction_index);
    let r0 = r0 * r0;
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

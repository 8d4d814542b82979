//! Per-pixel path tracing pipeline.
//!
//! A frame is six stages run back to back over the [`FrameState`] buffers.
//! Each stage is a rayon parallel loop over pixels that only touches its own
//! pixel's slots, and returns only once every pixel is done, so stage N+1
//! always sees the complete output of stage N.

use glam::Vec3A;
use rayon::prelude::*;

use crate::camera::{Camera, RenderMode};
use crate::frame::{FrameState, META_MISS, META_SKY};
use crate::hittable::{HitRecord, MIN_T};
use crate::interval::Interval;
use crate::material::Color;
use crate::random::PixelRng;
use crate::ray::Ray;
use crate::scene::RenderData;
use crate::sphere::nearest_sphere;

/// Lighting factor for bounces that do not sample lights.
pub const AMBIENT_LIGHT: f32 = 0.05;

/// Offset of shadow-ray origins along the surface normal.
pub const SHADOW_BIAS: f32 = 0.001;

/// Byte order of the display buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Red, green, blue, alpha.
    Rgba,
    /// Blue, green, red, alpha.
    Bgra,
}

impl ChannelOrder {
    /// Order expected by the platform's native bitmaps.
    pub fn native() -> Self {
        if cfg!(target_os = "windows") {
            ChannelOrder::Bgra
        } else {
            ChannelOrder::Rgba
        }
    }
}

/// ACES filmic curve (Narkowicz fit), clamped to [0, 1].
#[inline]
pub fn aces(x: Vec3A) -> Vec3A {
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(Vec3A::ZERO, Vec3A::ONE)
}

/// Stage 1: one jittered camera ray per pixel.
pub fn generate_rays(camera: &Camera, state: &mut FrameState) {
    let width = state.width().max(1) as usize;
    state
        .rays
        .par_iter_mut()
        .zip(state.rngs.par_iter_mut())
        .enumerate()
        .for_each(|(i, (ray, rng))| {
            let x = (i % width) as f32 + rng.next_f32();
            let y = (i / width) as f32 + rng.next_f32();
            *ray = camera.get_ray(x, y);
        });
}

/// Outcome of tracing one pixel's path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    /// Accumulated attenuation.
    pub color: Color,
    /// Product of the per-bounce lighting factors.
    pub lighting: Color,
    /// Distance to the primary hit, zero when nothing was hit.
    pub depth: f32,
    /// Primary sphere index or a sentinel.
    pub metadata: i32,
}

/// Trace a single path through the scene.
pub fn trace_path(scene: &RenderData, camera: &Camera, primary: Ray, rng: &mut PixelRng) -> PathSample {
    let settings = camera.settings();
    let mut ray = primary;
    let mut attenuation = Vec3A::ONE;
    let mut lighting = Vec3A::ONE;
    let mut depth = 0.0;
    let mut metadata = META_MISS;

    for bounce in 0..settings.max_color_bounces {
        let Some(rec) = nearest_sphere(&scene.spheres, &ray, Interval::beyond(MIN_T)) else {
            if bounce == 0 {
                return PathSample {
                    color: settings.no_hit_color,
                    lighting: Vec3A::ZERO,
                    depth: 0.0,
                    metadata: META_MISS,
                };
            }
            attenuation *= settings.no_hit_color;
            metadata = META_SKY;
            break;
        };

        if bounce == 0 {
            depth = rec.t;
            metadata = rec.index as i32;
        }

        let material = scene.sphere_material(rec.index);
        let Some(scatter) = material.scatter(&ray, &rec, rng) else {
            attenuation = Vec3A::ZERO;
            metadata = META_MISS;
            break;
        };
        attenuation *= scatter.attenuation;
        if material.is_light() {
            break;
        }

        if bounce < settings.light_bounces && metadata != META_MISS {
            lighting *= sample_direct_light(scene, &rec, settings.lights_per_sample, rng);
        } else {
            lighting *= AMBIENT_LIGHT;
        }
        ray = scatter.ray;
    }

    PathSample {
        color: attenuation,
        lighting,
        depth,
        metadata,
    }
}

/// Stage 2: bounce loop for every pixel.
pub fn color_rays(scene: &RenderData, camera: &Camera, state: &mut FrameState) {
    (
        state.color.par_iter_mut(),
        state.lighting.par_iter_mut(),
        state.depth.par_iter_mut(),
        state.metadata.par_iter_mut(),
        state.rngs.par_iter_mut(),
        state.rays.par_iter(),
    )
        .into_par_iter()
        .for_each(|(color, lighting, depth, metadata, rng, ray)| {
            let sample = trace_path(scene, camera, *ray, rng);
            *color = sample.color;
            *lighting = sample.lighting;
            *depth = sample.depth;
            *metadata = sample.metadata;
        });
}

/// Estimate direct light at a hit point with shadow rays.
///
/// Runs `min(lights_per_sample, light count)` trials toward uniformly chosen
/// light spheres and averages the unoccluded contributions. A scene without
/// lights yields zero.
pub fn sample_direct_light(scene: &RenderData, rec: &HitRecord, lights_per_sample: u32, rng: &mut PixelRng) -> Color {
    let lights = scene.light_ids();
    let trials = (lights_per_sample as usize).min(lights.len());
    if trials == 0 {
        return Vec3A::ZERO;
    }

    let origin = rec.p + rec.normal * SHADOW_BIAS;
    let mut total = Vec3A::ZERO;
    for _ in 0..trials {
        let light = &scene.spheres[lights[rng.next_index(lights.len())] as usize];
        let shadow = Ray::new(origin, light.center() - origin);
        let Some(hit) = nearest_sphere(&scene.spheres, &shadow, Interval::beyond(MIN_T)) else {
            continue;
        };
        let material = scene.sphere_material(hit.index);
        if material.is_light() {
            total += material.color() * rec.normal.dot(shadow.direction).max(0.0);
        }
    }
    total / trials as f32
}

/// Stage 3: tone map lighting in place, leaving missed pixels untouched.
pub fn normalize_lighting(state: &mut FrameState) {
    state
        .lighting
        .par_iter_mut()
        .zip(state.metadata.par_iter())
        .for_each(|(lighting, &metadata)| {
            if metadata != META_MISS {
                *lighting = aces(*lighting);
            }
        });
}

/// Composite one pixel for the given display mode.
#[inline]
pub fn combine_pixel(mode: RenderMode, color: Color, lighting: Color, metadata: i32, min_light: f32) -> Color {
    let floor = Vec3A::splat(min_light);
    match mode {
        RenderMode::Combined if metadata == META_MISS => color,
        RenderMode::Combined => color * lighting.max(floor),
        RenderMode::GlobalIllumination => color,
        RenderMode::DirectLighting => match metadata {
            META_MISS => color,
            META_SKY => lighting.max(floor),
            _ => lighting,
        },
    }
}

/// Stage 4: write the combined color of every pixel.
pub fn combine(camera: &Camera, state: &mut FrameState) {
    let mode = camera.mode();
    let min_light = camera.settings().min_light;
    (
        state.output.par_iter_mut(),
        state.color.par_iter(),
        state.lighting.par_iter(),
        state.metadata.par_iter(),
    )
        .into_par_iter()
        .for_each(|(output, &color, &lighting, &metadata)| {
            *output = combine_pixel(mode, color, lighting, metadata, min_light);
        });
}

/// Weight of the new frame in the temporal blend.
///
/// Full weight for the first two frames after a camera change, then
/// `2 / ticks`, never below `1 - taa_exponent`.
#[inline]
pub fn blend_weight(ticks_since_movement: u32, taa_exponent: f32) -> f32 {
    if ticks_since_movement <= 1 {
        1.0
    } else {
        (2.0 / ticks_since_movement as f32).max(1.0 - taa_exponent)
    }
}

/// Stage 5: blend this frame into the accumulation buffer.
///
/// The first frame after allocation copies the output verbatim.
pub fn temporal_blend(state: &mut FrameState, taa_exponent: f32) {
    let weight = if state.frame_index == 0 {
        1.0
    } else {
        blend_weight(state.ticks_since_movement, taa_exponent)
    };

    if weight >= 1.0 {
        state.taa.par_iter_mut().zip(state.output.par_iter()).for_each(|(taa, &output)| {
            *taa = output;
        });
    } else {
        state.taa.par_iter_mut().zip(state.output.par_iter()).for_each(|(taa, &output)| {
            *taa = *taa * (1.0 - weight) + output * weight;
        });
    }
}

/// Quantize a linear channel value to a byte.
#[inline]
pub fn to_byte(value: f32) -> u8 {
    (255.99 * value.clamp(0.0, 1.0)) as u8
}

/// Stage 6: quantize the accumulation buffer into 4-byte pixels.
pub fn draw_to_bitmap(taa: &[Vec3A], bytes: &mut [u8], order: ChannelOrder) {
    bytes
        .par_chunks_exact_mut(4)
        .zip(taa.par_iter())
        .for_each(|(pixel, value)| {
            let (r, g, b) = (to_byte(value.x), to_byte(value.y), to_byte(value.z));
            let channels = match order {
                ChannelOrder::Rgba => [r, g, b, 255],
                ChannelOrder::Bgra => [b, g, r, 255],
            };
            pixel.copy_from_slice(&channels);
        });
}

/// Run the full pipeline for one frame and advance the frame counters.
pub fn render_frame(scene: &RenderData, camera: &Camera, state: &mut FrameState, bytes: &mut [u8], order: ChannelOrder) {
    generate_rays(camera, state);
    color_rays(scene, camera, state);
    normalize_lighting(state);
    combine(camera, state);
    temporal_blend(state, camera.settings().taa_exponent);
    draw_to_bitmap(&state.taa, bytes, order);
    state.advance();
}

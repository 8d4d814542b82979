//! Per-pixel working buffers that persist across frames.
//!
//! Every buffer is a flat, row-major vector with one entry per pixel. A
//! [`FrameState`] is built for one resolution only; a resize drops it and
//! builds a new one, which also reseeds the per-pixel generators and
//! restarts temporal accumulation.

use glam::Vec3A;
use log::debug;

use crate::error::{RenderError, Result};
use crate::random::{PixelRng, SeedSource};
use crate::ray::Ray;

/// Metadata of a pixel whose primary ray missed or whose path was absorbed.
pub const META_MISS: i32 = -1;

/// Metadata of a pixel whose path escaped to the sky after at least one hit.
pub const META_SKY: i32 = -2;

/// Structure-of-arrays frame state for one resolution.
#[derive(Debug)]
pub struct FrameState {
    width: u32,
    height: u32,
    /// Path throughput color.
    pub color: Vec<Vec3A>,
    /// Direct lighting estimate, tone mapped in place.
    pub lighting: Vec<Vec3A>,
    /// Combined color for the current frame.
    pub output: Vec<Vec3A>,
    /// Temporally accumulated color.
    pub taa: Vec<Vec3A>,
    /// Distance to the primary hit, zero on a miss.
    pub depth: Vec<f32>,
    /// Primary sphere index, [`META_MISS`] or [`META_SKY`].
    pub metadata: Vec<i32>,
    /// Camera rays of the current frame.
    pub rays: Vec<Ray>,
    /// Generators, mutated in place by every stage that samples.
    pub rngs: Vec<PixelRng>,
    /// Frames rendered since the camera last changed.
    pub ticks_since_movement: u32,
    /// Frames rendered since this state was allocated.
    pub frame_index: u64,
}

pub(crate) fn alloc_filled<T: Clone>(what: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| RenderError::Allocation { what, len })?;
    buffer.resize(len, value);
    Ok(buffer)
}

impl FrameState {
    /// Allocate every buffer for `width × height` pixels and seed one
    /// generator per pixel from `seed`.
    pub fn new(width: u32, height: u32, seed: SeedSource) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(RenderError::Allocation {
                what: "pixel",
                len: usize::MAX,
            })?;

        let mut seeder = seed.seeder();
        let mut rngs = Vec::new();
        rngs.try_reserve_exact(len)
            .map_err(|_| RenderError::Allocation { what: "rng", len })?;
        rngs.extend((0..len).map(|_| PixelRng::from_source(&mut seeder)));

        let state = Self {
            width,
            height,
            color: alloc_filled("color", len, Vec3A::ZERO)?,
            lighting: alloc_filled("lighting", len, Vec3A::ZERO)?,
            output: alloc_filled("output", len, Vec3A::ZERO)?,
            taa: alloc_filled("taa", len, Vec3A::ZERO)?,
            depth: alloc_filled("depth", len, 0.0)?,
            metadata: alloc_filled("metadata", len, META_MISS)?,
            rays: alloc_filled("ray", len, Ray::default())?,
            rngs,
            ticks_since_movement: 0,
            frame_index: 0,
        };
        debug!("Allocated frame state {}x{} ({} pixels)", width, height, len);
        Ok(state)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.color.len()
    }

    /// Whether the state holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.color.is_empty()
    }

    /// Whether this state was allocated for the given resolution.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Restart temporal accumulation at full weight on the next frame.
    pub fn reset_accumulation(&mut self) {
        self.ticks_since_movement = 0;
    }

    /// Close the frame: advance both counters.
    pub fn advance(&mut self) {
        self.ticks_since_movement = self.ticks_since_movement.saturating_add(1);
        self.frame_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_match_resolution() {
        let state = FrameState::new(7, 5, SeedSource::Fixed(1)).unwrap();
        assert_eq!(state.len(), 35);
        assert_eq!(state.lighting.len(), 35);
        assert_eq!(state.taa.len(), 35);
        assert_eq!(state.depth.len(), 35);
        assert_eq!(state.rays.len(), 35);
        assert_eq!(state.rngs.len(), 35);
        assert!(state.metadata.iter().all(|&m| m == META_MISS));
        assert!(state.matches(7, 5));
        assert!(!state.matches(5, 7));
        assert_eq!(state.frame_index, 0);
    }

    #[test]
    fn zero_sized_state_is_empty() {
        let state = FrameState::new(0, 10, SeedSource::Fixed(1)).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn pixels_get_distinct_streams() {
        let mut state = FrameState::new(2, 1, SeedSource::Fixed(9)).unwrap();
        let a = state.rngs[0].next_f32();
        let b = state.rngs[1].next_f32();
        assert_ne!(a, b);

        let mut again = FrameState::new(2, 1, SeedSource::Fixed(9)).unwrap();
        assert_eq!(again.rngs[0].next_f32(), a);
    }

    #[test]
    fn counters_advance_and_reset() {
        let mut state = FrameState::new(1, 1, SeedSource::Fixed(0)).unwrap();
        state.advance();
        state.advance();
        assert_eq!(state.ticks_since_movement, 2);
        state.reset_accumulation();
        assert_eq!(state.ticks_since_movement, 0);
        assert_eq!(state.frame_index, 2);
    }
}

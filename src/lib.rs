//! ChromaLive real-time path tracer
//!
//! Renders spheres with diffuse, glass, metal and light materials through a
//! per-pixel pipeline of data-parallel stages, with stochastic direct light
//! sampling and temporal accumulation. Frames come out of a dedicated render
//! thread as display-ready bytes and can be saved as PNG/EXR or streamed to TEV.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod camera;
pub mod error;
pub mod frame;
pub mod hittable;
pub mod integrator;
pub mod interval;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod output;
pub mod random;
pub mod ray;
pub mod renderer;
pub mod scene;
pub mod scene_file;
pub mod sphere;

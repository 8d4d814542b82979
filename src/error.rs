//! Error type shared by the renderer, the scene packer and the collaborators.

use thiserror::Error;

/// Everything that can go wrong outside the per-pixel kernels.
///
/// Numerical degeneracies inside the kernels are never errors; they are
/// guarded by epsilons and produce bounded artifacts instead.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A working buffer could not be allocated. Fatal for the current
    /// (re)allocation; resolution is never silently reduced.
    #[error("failed to allocate {what} buffer with {len} elements")]
    Allocation {
        /// Name of the buffer being allocated.
        what: &'static str,
        /// Requested element count.
        len: usize,
    },

    /// A sphere or mesh referenced a material that was never added.
    #[error("material index {index} out of range ({count} materials)")]
    InvalidMaterialIndex {
        /// Offending index.
        index: usize,
        /// Number of materials currently registered.
        count: usize,
    },

    /// Display mode outside {0, 1, 2}.
    #[error("unknown display mode {0}")]
    InvalidMode(i32),

    /// Malformed OBJ input.
    #[error("OBJ parse error at line {line}: {message}")]
    ObjParse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// File system failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Scene JSON could not be read or written.
    #[error("scene file: {0}")]
    SceneFormat(#[from] serde_json::Error),

    /// PNG encoding failure.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    /// EXR encoding failure.
    #[error("exr: {0}")]
    Exr(#[from] exr::error::Error),

    /// A live display could not be reached or refused a frame.
    #[error("display: {0}")]
    Display(String),

    /// The render thread panicked before it could hand back the scene.
    #[error("render thread panicked")]
    ThreadPanicked,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

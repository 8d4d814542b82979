//! # Output Module
//!
//! Display surfaces that consume finished frames:
//! - [`SnapshotDisplay`] keeps the latest frame for saving as PNG or EXR
//! - [`TevDisplay`] streams frames to a running TEV viewer
//!
//! ## Size checks
//!
//! A surface has a fixed size until it is resized. Frames of any other size
//! (rendered before a resize reached the render thread) are logged and
//! dropped instead of being copied.
//!
//! ## File export
//!
//! PNG files store the display bytes as-is, since the pipeline already tone
//! maps. EXR files store the linear accumulation buffer at full precision.

use std::net::TcpStream;
use std::path::Path;

use exr::prelude::write_rgb_file;
use image::{ImageBuffer, Rgba};
use log::{debug, info, warn};
use tev_client::{PacketCreateImage, PacketUpdateImage, TevClient};

use crate::error::{RenderError, Result};
use crate::integrator::ChannelOrder;
use crate::renderer::Frame;

/// Default TEV port.
pub const TEV_DEFAULT_PORT: u16 = 14158;

const TEV_IMAGE_NAME: &str = "chromalive";

/// Something that shows finished frames.
pub trait DisplaySurface {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    /// Change the size frames must have to be accepted.
    fn resize(&mut self, width: u32, height: u32);

    /// Show a frame. Returns `Ok(false)` if it was dropped for having the
    /// wrong size.
    fn present(&mut self, frame: &Frame) -> Result<bool>;
}

/// Whether `frame` fits a surface of `size`; logs the mismatch otherwise.
fn accepts(size: (u32, u32), frame: &Frame) -> bool {
    let expected = size.0 as usize * size.1 as usize * 4;
    if (frame.width, frame.height) != size || frame.pixels.len() != expected {
        warn!(
            "Dropping {}x{} frame ({} bytes) on a {}x{} display",
            frame.width,
            frame.height,
            frame.pixels.len(),
            size.0,
            size.1
        );
        return false;
    }
    true
}

/// Keeps a copy of the most recent frame.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDisplay {
    width: u32,
    height: u32,
    latest: Option<Frame>,
    presented: u64,
}

impl SnapshotDisplay {
    /// Empty display of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Last accepted frame.
    pub fn latest(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }

    /// Number of frames accepted so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySurface for SnapshotDisplay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn present(&mut self, frame: &Frame) -> Result<bool> {
        if !accepts(self.size(), frame) {
            return Ok(false);
        }
        match &mut self.latest {
            // Reuse the existing allocation
            Some(latest) => latest.clone_from(frame),
            None => self.latest = Some(frame.clone()),
        }
        self.presented += 1;
        Ok(true)
    }
}

/// Streams frames to a TEV instance.
pub struct TevDisplay {
    client: TevClient,
    address: String,
    width: u32,
    height: u32,
    created: bool,
    rgb: Vec<f32>,
}

impl std::fmt::Debug for TevDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TevDisplay")
            .field("address", &self.address)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Append the default TEV port when `address` has none.
pub fn tev_address_with_port(address: &str) -> String {
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, TEV_DEFAULT_PORT)
    }
}

impl TevDisplay {
    /// Connect to TEV at `address` (`host` or `host:port`).
    pub fn connect(address: &str, width: u32, height: u32) -> Result<Self> {
        let address = tev_address_with_port(address);
        debug!("Attempting to connect to TEV at {}", address);
        let stream = TcpStream::connect(&address)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        info!("Connected to TEV at {}", address);
        Ok(Self {
            client: TevClient::wrap(stream),
            address,
            width,
            height,
            created: false,
            rgb: Vec::new(),
        })
    }

    fn create_image(&mut self) -> Result<()> {
        self.client
            .send(PacketCreateImage {
                image_name: TEV_IMAGE_NAME,
                grab_focus: true,
                width: self.width,
                height: self.height,
                channel_names: &["R", "G", "B"],
            })
            .map_err(|e| RenderError::Display(format!("TEV create image: {}", e)))?;
        self.created = true;
        Ok(())
    }
}

impl DisplaySurface for TevDisplay {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.created = false;
    }

    fn present(&mut self, frame: &Frame) -> Result<bool> {
        if !accepts(self.size(), frame) {
            return Ok(false);
        }
        if !self.created {
            self.create_image()?;
        }

        self.rgb.clear();
        self.rgb.extend(frame.linear.iter().flat_map(|c| c.to_array()));
        self.client
            .send(PacketUpdateImage {
                image_name: TEV_IMAGE_NAME,
                grab_focus: false,
                channel_names: &["R", "G", "B"],
                channel_offsets: &[0, 1, 2],
                channel_strides: &[3, 3, 3],
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
                data: &self.rgb,
            })
            .map_err(|e| RenderError::Display(format!("TEV update image: {}", e)))?;
        Ok(true)
    }
}

/// Display bytes of `frame` reordered to RGBA.
pub fn frame_rgba(frame: &Frame) -> Vec<u8> {
    match frame.order {
        ChannelOrder::Rgba => frame.pixels.clone(),
        ChannelOrder::Bgra => frame
            .pixels
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect(),
    }
}

/// Save the display bytes of a frame as PNG.
pub fn save_frame_as_png(frame: &Frame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let image: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(frame.width, frame.height, frame_rgba(frame))
        .ok_or_else(|| {
            RenderError::Display(format!(
                "{} bytes do not form a {}x{} image",
                frame.pixels.len(),
                frame.width,
                frame.height
            ))
        })?;
    image.save(path)?;
    info!("Image saved as {}", path.display());
    Ok(())
}

/// Save the linear accumulation buffer of a frame as EXR.
pub fn save_frame_as_exr(frame: &Frame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let width = frame.width as usize;
    let expected = width * frame.height as usize;
    if frame.linear.len() != expected {
        return Err(RenderError::Display(format!(
            "{} linear pixels do not form a {}x{} image",
            frame.linear.len(),
            frame.width,
            frame.height
        )));
    }
    write_rgb_file(path, width, frame.height as usize, |x, y| {
        let c = frame.linear[y * width + x];
        (c.x, c.y, c.z)
    })?;
    info!("HDR image saved as EXR: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3A;

    fn frame(width: u32, height: u32, order: ChannelOrder) -> Frame {
        let n = (width * height) as usize;
        Frame {
            width,
            height,
            index: 0,
            order,
            pixels: [10u8, 20, 30, 255].repeat(n),
            linear: vec![Vec3A::new(0.25, 0.5, 1.5); n],
        }
    }

    #[test]
    fn mismatched_frames_are_dropped() {
        let mut display = SnapshotDisplay::new(4, 4);
        assert!(!display.present(&frame(2, 2, ChannelOrder::Rgba)).unwrap());
        assert!(display.latest().is_none());

        let mut short = frame(4, 4, ChannelOrder::Rgba);
        short.pixels.truncate(10);
        assert!(!display.present(&short).unwrap());

        assert!(display.present(&frame(4, 4, ChannelOrder::Rgba)).unwrap());
        assert_eq!(display.presented(), 1);

        display.resize(2, 2);
        assert!(display.present(&frame(2, 2, ChannelOrder::Rgba)).unwrap());
        assert_eq!(display.latest().unwrap().width, 2);
    }

    #[test]
    fn bgra_is_swizzled_for_export() {
        let f = frame(1, 1, ChannelOrder::Bgra);
        assert_eq!(frame_rgba(&f), vec![30, 20, 10, 255]);
    }

    #[test]
    fn png_and_exr_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let f = frame(3, 2, ChannelOrder::Rgba);

        let png = dir.path().join("out.png");
        save_frame_as_png(&f, &png).unwrap();
        let decoded = image::open(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1).0, [10, 20, 30, 255]);

        let exr = dir.path().join("out.exr");
        save_frame_as_exr(&f, &exr).unwrap();
        assert!(std::fs::metadata(&exr).unwrap().len() > 0);
    }

    #[test]
    fn short_buffers_are_rejected_on_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = frame(3, 2, ChannelOrder::Rgba);
        f.linear.truncate(4);
        let exr = dir.path().join("short.exr");
        assert!(matches!(save_frame_as_exr(&f, &exr), Err(RenderError::Display(_))));
        assert!(!exr.exists());

        f.pixels.truncate(8);
        assert!(matches!(
            save_frame_as_png(&f, dir.path().join("short.png")),
            Err(RenderError::Display(_))
        ));
    }

    #[test]
    fn tev_port_defaults() {
        assert_eq!(tev_address_with_port("localhost"), "localhost:14158");
        assert_eq!(tev_address_with_port("10.0.0.2:9000"), "10.0.0.2:9000");
    }
}

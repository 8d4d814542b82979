//! Render driver and render thread.
//!
//! [`Renderer`] sequences the integrator stages for one frame and owns the
//! scene packer and the frame state. [`RenderHandle::spawn`] moves a renderer
//! onto a dedicated thread running a fixed-cadence loop; the handle is the
//! only way the rest of the program talks to it:
//!
//! - camera changes are whole-camera swaps picked up at the next frame,
//! - finished frames arrive as owned copies on a bounded channel, and are
//!   dropped rather than queued when the presenter falls behind,
//! - stopping is cooperative and hands the scene back on join.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use glam::Vec3A;
use log::{debug, info, trace};
use parking_lot::Mutex;

use crate::camera::{Camera, RenderMode};
use crate::error::{RenderError, Result};
use crate::frame::{alloc_filled, FrameState};
use crate::integrator::{self, ChannelOrder};
use crate::random::SeedSource;
use crate::scene::ScenePacker;
use crate::scene_file::SceneDescription;

/// Longest interval a [`FrameTimer`] will wait between frames. Keeps the
/// stop flag responsive at very low frame rates.
pub const MAX_FRAME_INTERVAL: Duration = Duration::from_secs(10);

/// Back-off while the camera has nothing to render.
const IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Keeps a loop at a target frame interval.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    target: Duration,
    started: Instant,
    last_frame: Duration,
}

impl FrameTimer {
    /// Timer for `fps` frames per second; zero or negative means uncapped.
    pub fn new(fps: f32) -> Self {
        let target = if fps > 0.0 {
            // Rates too low to express as an interval are capped
            Duration::try_from_secs_f32(1.0 / fps).unwrap_or(MAX_FRAME_INTERVAL)
        } else {
            Duration::ZERO
        };
        let target = target.min(MAX_FRAME_INTERVAL);
        Self {
            target,
            started: Instant::now(),
            last_frame: Duration::ZERO,
        }
    }

    /// Mark the start of a frame.
    pub fn start(&mut self) {
        self.started = Instant::now();
    }

    /// Sleep out the rest of the frame interval and return the time the
    /// frame's work took.
    pub fn finish(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if let Some(remaining) = self.target.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
        self.last_frame = elapsed;
        elapsed
    }

    /// Work time of the last finished frame.
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame
    }

    /// Target interval.
    pub fn target(&self) -> Duration {
        self.target
    }
}

/// A finished frame, copied out of the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame number since the frame state was allocated.
    pub index: u64,
    /// Byte order of `pixels`.
    pub order: ChannelOrder,
    /// `width × height × 4` display bytes, alpha always 255.
    pub pixels: Vec<u8>,
    /// Linear accumulated color, one entry per pixel.
    pub linear: Vec<Vec3A>,
}

/// Single-threaded frame driver.
#[derive(Debug)]
pub struct Renderer {
    packer: ScenePacker,
    state: Option<FrameState>,
    pixels: Vec<u8>,
    seed: SeedSource,
    order: ChannelOrder,
    allocations: usize,
}

impl Renderer {
    /// Driver over an already populated packer.
    pub fn new(packer: ScenePacker, seed: SeedSource) -> Self {
        Self {
            packer,
            state: None,
            pixels: Vec::new(),
            seed,
            order: ChannelOrder::native(),
            allocations: 0,
        }
    }

    /// Use a specific display byte order.
    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }

    /// Scene packer, for adding objects between frames.
    pub fn packer_mut(&mut self) -> &mut ScenePacker {
        &mut self.packer
    }

    /// Scene packer.
    pub fn packer(&self) -> &ScenePacker {
        &self.packer
    }

    /// Current frame state, if one has been allocated.
    pub fn frame_state(&self) -> Option<&FrameState> {
        self.state.as_ref()
    }

    /// How many times the frame state has been (re)allocated.
    pub fn allocation_count(&self) -> usize {
        self.allocations
    }

    /// Restart temporal accumulation on the next frame.
    pub fn reset_accumulation(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.reset_accumulation();
        }
    }

    fn ready_frame_state(&mut self, width: u32, height: u32) -> Result<()> {
        if self.state.as_ref().is_some_and(|s| s.matches(width, height)) {
            return Ok(());
        }

        // Release the old buffers before asking for new ones
        self.state = None;
        self.pixels = Vec::new();

        let state = FrameState::new(width, height, self.seed)?;
        self.pixels = alloc_filled("display", state.len() * 4, 0u8)?;
        self.state = Some(state);
        self.allocations += 1;
        debug!("Frame buffers ready for {}x{} (allocation #{})", width, height, self.allocations);
        Ok(())
    }

    /// Render one frame through `camera`.
    ///
    /// Returns `Ok(None)` without touching any buffer when either dimension
    /// is zero.
    pub fn render_frame(&mut self, camera: &Camera) -> Result<Option<Frame>> {
        if !camera.is_renderable() {
            trace!("Skipping frame at {}x{}", camera.width(), camera.height());
            return Ok(None);
        }
        self.ready_frame_state(camera.width(), camera.height())?;

        let scene = self.packer.packed_scene();
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        integrator::render_frame(&scene, camera, state, &mut self.pixels, self.order);

        Ok(Some(Frame {
            width: state.width(),
            height: state.height(),
            index: state.frame_index - 1,
            order: self.order,
            pixels: self.pixels.clone(),
            linear: state.taa.clone(),
        }))
    }
}

/// Render thread configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Target frame rate; zero renders as fast as possible.
    pub fps: f32,
    /// Per-pixel generator seeding.
    pub seed: SeedSource,
    /// Display byte order.
    pub order: ChannelOrder,
    /// Stop by itself after this many rendered frames.
    pub max_frames: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: 60.0,
            seed: SeedSource::Entropy,
            order: ChannelOrder::native(),
            max_frames: None,
        }
    }
}

#[derive(Debug)]
struct Shared {
    camera: Mutex<Arc<Camera>>,
    version: AtomicU64,
    stop: AtomicBool,
}

impl Shared {
    fn update_camera(&self, change: impl FnOnce(&Camera) -> Camera) {
        let mut camera = self.camera.lock();
        *camera = Arc::new(change(&camera));
        self.version.fetch_add(1, Ordering::Release);
    }
}

/// Owner-side handle to a running render thread.
#[derive(Debug)]
pub struct RenderHandle {
    shared: Arc<Shared>,
    frames: Receiver<Frame>,
    thread: Option<JoinHandle<Result<SceneDescription>>>,
}

impl RenderHandle {
    /// Start a render thread for `scene`.
    pub fn spawn(scene: SceneDescription, settings: RenderSettings) -> Result<Self> {
        let shared = Arc::new(Shared {
            camera: Mutex::new(Arc::new(Camera::new(scene.camera))),
            version: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        });
        let (sender, frames) = sync_channel(1);

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("render".into())
            .spawn(move || render_loop(&thread_shared, &sender, scene, settings))?;

        Ok(Self {
            shared,
            frames,
            thread: Some(thread),
        })
    }

    /// Move by `movement` and turn by `turn` (pitch in `x`, yaw in `y`).
    pub fn move_camera(&self, movement: Vec3A, turn: Vec3A) {
        self.shared.update_camera(|c| c.moved(movement, turn));
    }

    /// Switch display mode (0 combined, 1 global illumination, 2 direct).
    pub fn set_mode(&self, mode: i32) -> Result<()> {
        let mode = RenderMode::try_from(mode)?;
        info!("Display mode: {}", mode.describe());
        self.shared.update_camera(|c| c.with_mode(mode));
        Ok(())
    }

    /// Change the output resolution.
    pub fn resize(&self, width: u32, height: u32) {
        self.shared.update_camera(|c| c.with_resolution(width, height));
    }

    /// Camera the next frame will use.
    pub fn camera(&self) -> Arc<Camera> {
        Arc::clone(&self.shared.camera.lock())
    }

    /// Finished frames, in order. Closes when the thread exits.
    pub fn frames(&self) -> &Receiver<Frame> {
        &self.frames
    }

    /// Wait up to `timeout` for the next frame.
    pub fn next_frame(&self, timeout: Duration) -> Option<Frame> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Ask the thread to stop after its current frame.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// Stop the thread, wait for it and take back the scene.
    pub fn join(mut self) -> Result<SceneDescription> {
        self.stop();
        let thread = self.thread.take().ok_or(RenderError::ThreadPanicked)?;
        // Unblock a final blocking send
        drop(std::mem::replace(&mut self.frames, sync_channel(0).1));
        thread.join().map_err(|_| RenderError::ThreadPanicked)?
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop();
            drop(std::mem::replace(&mut self.frames, sync_channel(0).1));
            let _ = thread.join();
        }
    }
}

fn render_loop(
    shared: &Shared,
    frames: &SyncSender<Frame>,
    scene: SceneDescription,
    settings: RenderSettings,
) -> Result<SceneDescription> {
    let mut packer = ScenePacker::new();
    scene.install(&mut packer)?;
    let mut renderer = Renderer::new(packer, settings.seed).with_channel_order(settings.order);
    let mut timer = FrameTimer::new(settings.fps);

    let mut camera = Arc::clone(&shared.camera.lock());
    let mut seen_version = shared.version.load(Ordering::Acquire);
    let mut rendered = 0u64;
    let mut dropped = 0u64;
    info!(
        "Render thread started: {} spheres, target {:.1} fps",
        scene.objects.len(),
        settings.fps
    );

    while !shared.stop.load(Ordering::Acquire) {
        timer.start();

        let version = shared.version.load(Ordering::Acquire);
        if version != seen_version {
            camera = Arc::clone(&shared.camera.lock());
            seen_version = version;
            renderer.reset_accumulation();
        }

        let Some(frame) = renderer.render_frame(&camera)? else {
            trace!("Nothing to render at {}x{}", camera.width(), camera.height());
            timer.finish();
            std::thread::sleep(IDLE_INTERVAL);
            continue;
        };
        rendered += 1;
        let last = settings.max_frames.is_some_and(|max| rendered >= max);
        let delivered = if last {
            frames.send(frame).is_ok()
        } else {
            match frames.try_send(frame) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    trace!("Presenter busy, dropped frame {}", rendered);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        };
        if !delivered {
            debug!("Presenter disconnected, stopping");
            break;
        }
        if last {
            break;
        }

        let work = timer.finish();
        trace!("Frame {} took {:.2?}", rendered, work);
    }

    info!(
        "Render thread stopped after {} frames ({} dropped, {} scene rebuilds)",
        rendered,
        dropped,
        renderer.packer().rebuild_count()
    );
    drop(renderer);

    // Hand back the latest camera, including changes made after the last frame
    let camera = Arc::clone(&shared.camera.lock());
    Ok(SceneDescription {
        camera: *camera.settings(),
        ..scene
    })
}

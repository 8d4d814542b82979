use std::error::Error;

use clap::Parser;
use glam::Vec3A;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

mod cli;
mod logger;

use chromalive::camera::RenderMode;
use chromalive::integrator::ChannelOrder;
use chromalive::output::{save_frame_as_exr, save_frame_as_png, DisplaySurface, SnapshotDisplay, TevDisplay};
use chromalive::random::SeedSource;
use chromalive::renderer::{RenderHandle, RenderSettings};
use chromalive::scene_file::SceneDescription;
use cli::Args;
use logger::init_logger;

/// Connect to TEV if requested; a failed connection only disables it.
fn connect_tev(args: &Args, width: u32, height: u32) -> Option<TevDisplay> {
    if !args.tev && args.tev_address.is_none() {
        return None;
    }
    let address = args.tev_address.as_deref().unwrap_or("localhost");
    match TevDisplay::connect(address, width, height) {
        Ok(display) => Some(display),
        Err(e) => {
            warn!("Failed to connect to TEV on {}: {}", address, e);
            None
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logger(args.debug_level.clone().into());

    // Log application startup with version information
    info!("ChromaLive - Git Version {} ({})", env!("GIT_HASH"), env!("GIT_DATE"));

    if let Some(threads) = args.cpu_threads {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global()?;
    }
    info!("Using {} worker threads", rayon::current_num_threads());

    let mut scene = SceneDescription::load_or_default(&args.scene)?;
    if let Some(width) = args.width {
        scene.camera.width = width;
    }
    if let Some(height) = args.height {
        scene.camera.height = height;
    }
    if let Some(mode) = args.mode {
        scene.camera.mode = RenderMode::try_from(mode)?;
    }
    let (width, height) = (scene.camera.width, scene.camera.height);
    info!(
        "Image resolution: {}x{}, mode: {}, {} frames at {} fps",
        width,
        height,
        scene.camera.mode.describe(),
        args.frames,
        args.fps
    );

    let settings = RenderSettings {
        fps: args.fps,
        seed: args.seed.map_or(SeedSource::Entropy, SeedSource::Fixed),
        order: ChannelOrder::native(),
        max_frames: Some(args.frames),
    };

    let mut snapshot = SnapshotDisplay::new(width, height);
    let mut tev = connect_tev(&args, width, height);

    let handle = RenderHandle::spawn(scene, settings)?;
    let progress = ProgressBar::new(args.frames);
    progress.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} frames {msg}",
    )?);

    let turn = Vec3A::new(0.0, args.spin.to_radians(), 0.0);
    for frame in handle.frames() {
        snapshot.present(&frame)?;
        if let Some(display) = tev.as_mut() {
            if let Err(e) = display.present(&frame) {
                warn!("Disabling TEV output: {}", e);
                tev = None;
            }
        }
        progress.set_position(frame.index + 1);
        if args.spin != 0.0 {
            handle.move_camera(Vec3A::ZERO, turn);
        }
    }
    progress.finish_with_message("done");

    let scene = handle.join()?;
    info!("Presented {} of {} frames", snapshot.presented(), args.frames);

    match snapshot.latest() {
        Some(frame) => {
            save_frame_as_png(frame, &args.output)?;
            if let Some(path) = &args.exr {
                save_frame_as_exr(frame, path)?;
            }
        }
        None => warn!("No frame was rendered, nothing to save"),
    }

    if let Some(path) = &args.save_scene {
        scene.save(path)?;
    }
    Ok(())
}

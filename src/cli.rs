use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Custom enum for log levels that can be used with clap's ValueEnum
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convert our custom LogLevel enum to log crate's LevelFilter
impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Command line arguments structure using clap derive macros
#[derive(Parser, Debug)]
#[command(name = "chromalive")]
#[command(about = "Real-time path tracer with temporal accumulation")]
pub struct Args {
    /// Set the logging level (defaults to "info")
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub debug_level: LogLevel,

    /// Scene file; the built-in debug scene is used if it does not exist
    #[arg(long, default_value = "debug_scene.json")]
    pub scene: String,

    /// Write the scene back to this file on exit
    #[arg(long)]
    pub save_scene: Option<String>,

    /// Image width in pixels (overrides the scene camera)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: Option<u32>,

    /// Image height in pixels (overrides the scene camera)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: Option<u32>,

    /// Target frame rate, 0 for uncapped
    #[arg(long, default_value_t = 60.0)]
    pub fps: f32,

    /// Number of frames to render before exiting
    #[arg(long, short = 'n', default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub frames: u64,

    /// Display mode: 0 combined, 1 global illumination, 2 direct lighting
    #[arg(long, short = 'm')]
    pub mode: Option<i32>,

    /// Seed for reproducible noise; fresh entropy when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Yaw the camera by this many degrees per presented frame
    #[arg(long, default_value_t = 0.0)]
    pub spin: f32,

    /// Size of the rayon worker pool (defaults to one per core)
    #[arg(long)]
    pub cpu_threads: Option<usize>,

    /// Send frames to TEV for real-time visualization
    #[arg(long, help = "Send frames to TEV for real-time visualization")]
    pub tev: bool,

    /// TEV client IP address and port (automatically enables --tev)
    #[arg(long, help = "TEV client IP address and port (automatically enables --tev)")]
    pub tev_address: Option<String>,

    /// PNG file for the last frame
    #[arg(short, long, default_value = "output.png")]
    pub output: String,

    /// Also save the linear accumulation buffer of the last frame as EXR
    #[arg(long)]
    pub exr: Option<String>,
}

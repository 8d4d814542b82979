use std::io::Write;

use log::LevelFilter;

/// Initialize the logger with the specified level.
///
/// Each record carries the name of the thread that emitted it.
pub fn init_logger(level: LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format(|buf, record| {
            let thread = std::thread::current();
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                thread.name().unwrap_or("worker"),
                record.args()
            )
        })
        .init();
}

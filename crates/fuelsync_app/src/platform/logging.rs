//! Diagnostic logging for the `fuelsync` binary.
//!
//! Always appends to the log file in the state directory; `-v` also mirrors
//! to stderr so stdout stays reserved for the session transcript.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fuelsync_logging::{level_from_verbosity, TARGET_PREFIX};
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub fn initialize(log_file: &Path, verbosity: u8) {
    let file_level = level_from_verbosity(verbosity).max(LevelFilter::Info);
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if verbosity > 0 {
        loggers.push(TermLogger::new(
            level_from_verbosity(verbosity),
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if let Some(file_logger) = create_file_logger(log_file, file_level, config) {
        loggers.push(file_logger);
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_allow_str(TARGET_PREFIX)
        .build()
}

fn create_file_logger(
    path: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<WriteLogger<File>>> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not open log file at {:?}: {}", path, err);
            None
        }
    }
}

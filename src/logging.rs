//! Structured logging setup for embedders of the engine.
//!
//! Mirrors the ambient logging convention used elsewhere in the codebase
//! this crate grew out of: colored, level-tagged lines on stdout for a
//! human at a terminal, plus a plain-text daily log file for later
//! inspection. The engine itself never initializes logging on its own —
//! embedders call [`init`] once at startup.

use colored::*;
use log::{Level, LevelFilter};
use std::fs;

pub fn init(app_name: impl AsRef<str>, verbosity: u64) -> Result<(), fern::InitError> {
    let log_root = format!("log/{}", app_name.as_ref());

    fs::create_dir_all(&log_root).expect("failed to create log directory");

    let stdout_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                match record.level() {
                    Level::Error => record.level().to_string().red(),
                    Level::Warn => record.level().to_string().yellow(),
                    Level::Info => record.level().to_string().cyan(),
                    Level::Debug => record.level().to_string().purple(),
                    Level::Trace => record.level().to_string().normal(),
                },
                record.target(),
                message
            ))
        })
        .level(match verbosity {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .chain(std::io::stdout());

    let log_file_path = format!(
        "{}/{}.{}.log",
        log_root,
        app_name.as_ref(),
        chrono::Utc::now().format("%Y_%m_%d")
    );

    let file_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(fern::log_file(log_file_path)?);

    fern::Dispatch::new()
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()?;

    Ok(())
}

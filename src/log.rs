//! Logging for layout runs.
//!
//! Progress goes to stdout and problems to stderr, coloured when writing to a terminal. Runs which
//! write outputs also keep two plain-text logs beside the CSV files: `run.log` with every message
//! at the chosen level and `problems.log` with only warnings and errors, so that a layout's
//! results carry the record of how they were generated.
//!
//! Messages from this crate follow the chosen level. Messages from dependencies are limited to
//! warnings and errors.
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Set once the logger has been installed
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Environment variable which overrides the log level in the settings file
pub const LOG_LEVEL_ENV_VAR: &str = "SITELAYOUT_LOG_LEVEL";

/// Log level used when neither the environment nor the settings file names one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file with every message at the chosen level
pub const RUN_LOG_FILE_NAME: &str = "run.log";

/// Log file with warnings and errors only
pub const PROBLEMS_LOG_FILE_NAME: &str = "problems.log";

/// Log target prefix of this crate's modules
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Work out the log level from the environment and settings file.
///
/// The environment variable wins over the settings file, which wins over [`DEFAULT_LOG_LEVEL`].
/// Level names are case-insensitive and include `off`.
pub fn resolve_level(from_env: Option<&str>, from_settings: Option<&str>) -> Result<LevelFilter> {
    let (name, source) = match (from_env, from_settings) {
        (Some(name), _) => (name, LOG_LEVEL_ENV_VAR),
        (None, Some(name)) => (name, "settings file"),
        (None, None) => (DEFAULT_LOG_LEVEL, "default"),
    };

    LevelFilter::from_str(name.trim())
        .map_err(|_| anyhow!("Unknown log level: {name} (from {source})"))
}

/// Install the program logger.
///
/// # Arguments
///
/// * `level_from_settings`: The log level named in the settings file, if any
/// * `output_dir`: If given, `run.log` and `problems.log` are created in this folder
pub fn init(level_from_settings: Option<&str>, output_dir: Option<&Path>) -> Result<()> {
    let from_env = env::var(LOG_LEVEL_ENV_VAR).ok();
    let level = resolve_level(from_env.as_deref(), level_from_settings)?;

    let mut dispatch = Dispatch::new()
        .level(level.min(LevelFilter::Warn))
        .level_for(CRATE_TARGET, level)
        .chain(console_dispatch(level));
    if let Some(dir) = output_dir {
        dispatch = dispatch.chain(file_dispatch(dir, level)?);
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT
        .set(())
        .map_err(|()| anyhow!("Logger already initialised"))
}

/// Terminal output: progress to stdout, problems to stderr
fn console_dispatch(level: LevelFilter) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let stdout_colour = std::io::stdout().is_terminal().then_some(colours);
    let stderr_colour = std::io::stderr().is_terminal().then_some(colours);

    Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .level(level)
                .format(move |out, message, record| {
                    write_console(out, message, record, stdout_colour.as_ref());
                })
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .level(level.min(LevelFilter::Warn))
                .format(move |out, message, record| {
                    write_console(out, message, record, stderr_colour.as_ref());
                })
                .chain(std::io::stderr()),
        )
}

/// Log files in the output folder, replacing any left by an earlier run
fn file_dispatch(dir: &Path, level: LevelFilter) -> Result<Dispatch> {
    let create = |name: &str| {
        let path = dir.join(name);
        File::create(&path).with_context(|| format!("Could not create {}", path.display()))
    };

    Ok(Dispatch::new()
        .format(write_file)
        .chain(
            Dispatch::new()
                .level(level.max(LevelFilter::Info))
                .chain(create(RUN_LOG_FILE_NAME)?),
        )
        .chain(
            Dispatch::new()
                .level(LevelFilter::Warn)
                .chain(create(PROBLEMS_LOG_FILE_NAME)?),
        ))
}

/// The module a message came from, without the crate prefix
fn module_label(target: &str) -> &str {
    target
        .strip_prefix(CRATE_TARGET)
        .and_then(|rest| rest.strip_prefix("::"))
        .unwrap_or(target)
}

fn write_console(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    let time = Local::now().format("%H:%M:%S");
    match colours {
        Some(colours) => write_line(out, time, colours.color(record.level()), record, message),
        None => write_line(out, time, record.level(), record, message),
    }
}

fn write_file(out: FormatCallback, message: &Arguments, record: &Record) {
    let time = Local::now().format("%Y-%m-%d %H:%M:%S");
    write_line(out, time, record.level(), record, message);
}

/// `[time level module] message`
fn write_line<T: Display, L: Display>(
    out: FormatCallback,
    time: T,
    level: L,
    record: &Record,
    message: &Arguments,
) {
    let module = module_label(record.target());
    out.finish(format_args!("[{time} {level} {module}] {message}"));
}

//! The `settings` subcommands: inspect and edit the program settings file.
use crate::log::{LOG_LEVEL_ENV_VAR, resolve_level};
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::env;
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Show the settings a run would use and where they come from
    Show,
    /// Edit the program settings file, creating it if needed
    Edit,
    /// Print the path the settings file is read from
    Path,
    /// Print a settings file with every setting at its default, commented out
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        let file_path = get_settings_file_path();
        match self {
            Self::Show => {
                let settings = Settings::load_from_path(&file_path)?;
                let from_env = env::var(LOG_LEVEL_ENV_VAR).ok();
                print!(
                    "{}",
                    describe_settings(&settings, &file_path, from_env.as_deref())?
                );
            }
            Self::Edit => edit_settings_file(&file_path)?,
            Self::Path => println!("{}", file_path.display()),
            Self::DumpDefault => print!("{}", Settings::default_file_contents()?),
        }

        Ok(())
    }
}

/// The effective settings, one per line, noting any value not taken from the settings file
fn describe_settings(
    settings: &Settings,
    file_path: &Path,
    level_from_env: Option<&str>,
) -> Result<String> {
    let mut out = String::new();
    if file_path.is_file() {
        writeln!(out, "# Settings file: {}", file_path.display())?;
    } else {
        writeln!(
            out,
            "# Settings file: {} (not found, using defaults)",
            file_path.display()
        )?;
    }

    let level = resolve_level(level_from_env, Some(settings.log_level.as_str()))?;
    let level = level.as_str().to_lowercase();
    match level_from_env {
        Some(_) => writeln!(out, "log_level = \"{level}\" # from {LOG_LEVEL_ENV_VAR}")?,
        None => writeln!(out, "log_level = \"{level}\"")?,
    }
    writeln!(out, "overwrite = {}", settings.overwrite)?;
    if settings.workers == 0 {
        writeln!(
            out,
            "workers = 0 # one per CPU: {}",
            settings.worker_count()
        )?;
    } else {
        writeln!(out, "workers = {}", settings.workers)?;
    }

    Ok(out)
}

/// Open the settings file in the user's editor and check that the result still loads
fn edit_settings_file(file_path: &Path) -> Result<()> {
    if !file_path.is_file() {
        write_default_settings(file_path)?;
    }

    println!("Opening settings file for editing: {}", file_path.display());
    edit::edit_file(file_path)
        .with_context(|| format!("Could not open editor for {}", file_path.display()))?;

    Settings::load_from_path(file_path).with_context(|| {
        format!(
            "Settings file {} is no longer valid. Run `sitelayout settings edit` to fix it.",
            file_path.display()
        )
    })?;

    Ok(())
}

/// Write the commented-out default settings to a new file
fn write_default_settings(file_path: &Path) -> Result<()> {
    if let Some(dir_path) = file_path.parent() {
        fs::create_dir_all(dir_path)
            .with_context(|| format!("Failed to create directory: {}", dir_path.display()))?;
    }

    fs::write(file_path, Settings::default_file_contents()?)
        .with_context(|| format!("Failed to write {}", file_path.display()))
}
